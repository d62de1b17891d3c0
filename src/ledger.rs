//! Append only daily runtime ledger
//!
//! One text file per ledger day, named `<prefix>_YYYY_MM_DD.txt`, starting with a commented
//! header line followed by one fixed width line per poll.

use std::{
    fmt,
    fs::{self, File},
    io::{self, ErrorKind, Write as _},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context as _;
use chrono::{NaiveDate, NaiveTime};
use itertools::Itertools as _;
use rev_lines::RawRevLines;

use crate::{
    delta::{self, Delta},
    device::Mode,
    reading::{Field, Minutes, Reading, UNAVAILABLE},
};

/// Column titles, in file order
const COLUMNS: [&str; 11] = [
    "Date",
    "Time",
    "Out Temp",
    "Set Temp",
    "In Temp",
    "Temp Diff",
    "Heat Total",
    "Cool Total",
    "Heat Run",
    "Cool Run",
    "Mode",
];

/// Width of each column, including its trailing comma
const COLUMN_WIDTH: usize = 12;

/// First character of commented lines
const COMMENT_MARKER: char = '#';

/// Block size when reading the ledger backwards
const TAIL_BLOCK_SIZE: usize = 4098;

/// Date column format
const DATE_FORMAT: &str = "%Y/%m/%d";

/// Time column format
const TIME_FORMAT: &str = "%H:%M";

/// Right justify a cell and terminate it
fn cell<T>(val: T) -> String
where
    T: fmt::Display,
{
    format!("{:>width$}", format!("{val},"), width = COLUMN_WIDTH)
}

/// Ledger file header line
pub(crate) fn header() -> String {
    let mut columns = COLUMNS.iter();
    let first = columns
        .next()
        .map(|c| format!("{COMMENT_MARKER}{:>width$}", format!("{c},"), width = COLUMN_WIDTH - 1))
        .unwrap_or_default();
    first + &columns.map(cell).join("")
}

/// Error returned when a ledger line can not be parsed
#[derive(thiserror::Error, Debug)]
pub(crate) enum RecordParseError {
    /// Wrong number of columns
    #[error("Expected {expected} columns, got {0}", expected = COLUMNS.len())]
    FieldCount(usize),
    /// Column value does not parse
    #[error("Invalid {column} value {value:?}")]
    InvalidField {
        /// Column title
        column: &'static str,
        /// Raw value
        value: String,
    },
}

/// Error returned when reading the ledger
#[derive(thiserror::Error, Debug)]
pub(crate) enum LedgerError {
    /// Ledger file could not be read
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Last ledger line is corrupted
    #[error("Malformed record in {path:?}: {source}")]
    Malformed {
        /// Ledger file
        path: PathBuf,
        /// Parse error
        source: RecordParseError,
    },
}

/// One line of the ledger
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LedgerRecord {
    /// Poll date
    pub date: NaiveDate,
    /// Poll time
    pub time: NaiveTime,
    /// Outdoor temperature (Fahrenheit)
    pub outdoor_temp: Field<f64>,
    /// Target temperature
    pub set_temp: Field<f64>,
    /// Indoor temperature
    pub indoor_temp: Field<f64>,
    /// Outdoor minus target temperature
    pub temp_diff: Field<i64>,
    /// Cumulative heating runtime of the ledger day
    pub heat_total: Field<Minutes>,
    /// Cumulative cooling runtime of the ledger day
    pub cool_total: Field<Minutes>,
    /// Heating runtime since previous record
    pub heat_run: Field<Minutes>,
    /// Cooling runtime since previous record
    pub cool_run: Field<Minutes>,
    /// HVAC mode
    pub mode: Mode,
}

impl LedgerRecord {
    /// Build a record from a reading and its delta against the previous record
    pub(crate) fn new(reading: &Reading, delta: Delta) -> Self {
        Self {
            date: reading.timestamp.date(),
            time: reading.timestamp.time(),
            outdoor_temp: reading.outdoor_temp.map(|t| t.imperial),
            set_temp: reading.set_temp,
            indoor_temp: reading.indoor_temp,
            temp_diff: delta::temp_diff(reading.outdoor_temp, reading.set_temp),
            heat_total: reading.heat_total,
            cool_total: reading.cool_total,
            heat_run: delta.heat,
            cool_run: delta.cool,
            mode: reading.mode,
        }
    }
}

impl fmt::Display for LedgerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = [
            self.date.format(DATE_FORMAT).to_string(),
            self.time.format(TIME_FORMAT).to_string(),
            temperature(self.outdoor_temp),
            temperature(self.set_temp),
            temperature(self.indoor_temp),
            delta::signed(self.temp_diff),
            self.heat_total.to_string(),
            self.cool_total.to_string(),
            self.heat_run.to_string(),
            self.cool_run.to_string(),
            self.mode.to_string(),
        ];
        write!(f, "{}", cells.into_iter().map(cell).join(""))
    }
}

/// Render a temperature column, whole degrees keeping their decimal
fn temperature(field: Field<f64>) -> String {
    field
        .value()
        .map_or_else(|| field.to_string(), |v| format!("{v:?}"))
}

/// Parse a column that may hold the unavailable placeholder
fn parse_field<T>(column: &'static str, s: &str) -> Result<Field<T>, RecordParseError>
where
    T: FromStr,
{
    if s == UNAVAILABLE {
        return Ok(Field::Unavailable);
    }
    s.parse()
        .map(Field::Value)
        .map_err(|_| RecordParseError::InvalidField {
            column,
            value: s.to_owned(),
        })
}

/// Parse a cumulative runtime column, negative values being fault markers
fn parse_total(column: &'static str, s: &str) -> Result<Field<Minutes>, RecordParseError> {
    Ok(match parse_field(column, s)? {
        Field::Value(v) if v < 0 => Field::Anomaly(v),
        f => f,
    })
}

/// Parse a column that is always present
fn parse_required<T, F, E>(column: &'static str, s: &str, parse: F) -> Result<T, RecordParseError>
where
    F: FnOnce(&str) -> Result<T, E>,
{
    parse(s).map_err(|_| RecordParseError::InvalidField {
        column,
        value: s.to_owned(),
    })
}

impl FromStr for LedgerRecord {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let cells: Vec<&str> = s.strip_suffix(',').unwrap_or(s).split(',').map(str::trim).collect();
        let &[
            date,
            time,
            outdoor_temp,
            set_temp,
            indoor_temp,
            temp_diff,
            heat_total,
            cool_total,
            heat_run,
            cool_run,
            mode,
        ] = cells.as_slice()
        else {
            return Err(RecordParseError::FieldCount(cells.len()));
        };
        let [
            c_date,
            c_time,
            c_out,
            c_set,
            c_in,
            c_diff,
            c_heat_total,
            c_cool_total,
            c_heat_run,
            c_cool_run,
            c_mode,
        ] = COLUMNS;
        Ok(Self {
            date: parse_required(c_date, date, |v| NaiveDate::parse_from_str(v, DATE_FORMAT))?,
            time: parse_required(c_time, time, |v| NaiveTime::parse_from_str(v, TIME_FORMAT))?,
            outdoor_temp: parse_field(c_out, outdoor_temp)?,
            set_temp: parse_field(c_set, set_temp)?,
            indoor_temp: parse_field(c_in, indoor_temp)?,
            temp_diff: parse_field(c_diff, temp_diff)?,
            heat_total: parse_total(c_heat_total, heat_total)?,
            cool_total: parse_total(c_cool_total, cool_total)?,
            heat_run: parse_field(c_heat_run, heat_run)?,
            cool_run: parse_field(c_cool_run, cool_run)?,
            mode: parse_required(c_mode, mode, str::parse::<Mode>)?,
        })
    }
}

/// Set of daily ledger files sharing a path prefix
pub(crate) struct LedgerStore {
    /// Path prefix, the day suffix is appended to it
    prefix: PathBuf,
}

impl LedgerStore {
    /// Build a store for files starting with `prefix`
    pub(crate) fn new(prefix: &Path) -> Self {
        Self {
            prefix: prefix.to_owned(),
        }
    }

    /// Ledger file path for a day
    pub(crate) fn path(&self, day: NaiveDate) -> PathBuf {
        let mut path = self.prefix.clone().into_os_string();
        path.push(day.format("_%Y_%m_%d.txt").to_string());
        path.into()
    }

    /// Create the ledger file of a day with its header, if it does not exist yet
    pub(crate) fn ensure_file(&self, day: NaiveDate) -> anyhow::Result<PathBuf> {
        let path = self.path(day);
        match File::options().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", header())
                    .with_context(|| format!("Failed to write header to {path:?}"))?;
                log::info!("Created ledger {path:?}");
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => {
                return Err(anyhow::Error::new(err).context(format!("Failed to create {path:?}")));
            }
        }
        Ok(path)
    }

    /// Append a record to the ledger of a day
    pub(crate) fn append(&self, day: NaiveDate, record: &LedgerRecord) -> anyhow::Result<()> {
        let path = self.ensure_file(day)?;
        let mut file = File::options()
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {path:?}"))?;
        file.write_all(format!("{record}\n").as_bytes())
            .with_context(|| format!("Failed to append to {path:?}"))?;
        Ok(())
    }

    /// Read the last record of a day, without reading the whole file
    pub(crate) fn last_record(&self, day: NaiveDate) -> Result<Option<LedgerRecord>, LedgerError> {
        let path = self.path(day);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        for line in RawRevLines::with_capacity(TAIL_BLOCK_SIZE, file) {
            let line = line?;
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_MARKER) {
                continue;
            }
            return line
                .parse()
                .map(Some)
                .map_err(|source| LedgerError::Malformed { path, source });
        }
        Ok(None)
    }

    /// Read the whole ledger of a day, or an empty string if there is none
    pub(crate) fn full_contents(&self, day: NaiveDate) -> anyhow::Result<String> {
        let path = self.path(day);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(s),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(anyhow::Error::new(err).context(format!("Failed to read {path:?}"))),
        }
    }

    /// Compute deltas for a reading and append it to the ledger of `day`
    pub(crate) fn record(&self, day: NaiveDate, reading: &Reading) -> anyhow::Result<LedgerRecord> {
        let previous = match self.last_record(day) {
            Ok(previous) => previous,
            Err(err @ LedgerError::Malformed { .. }) => {
                log::warn!("{err}, considering this the first reading of the day");
                None
            }
            Err(LedgerError::Io(err)) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to read last record of {:?}", self.path(day))));
            }
        };
        let record = LedgerRecord::new(reading, delta::delta(reading, previous.as_ref()));
        self.append(day, &record)?;
        log::info!("{:?}: {record}", self.path(day));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::reading::Temperature;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    fn reading(timestamp: NaiveDateTime, heat: Minutes, cool: Minutes) -> Reading {
        Reading {
            timestamp,
            outdoor_temp: Field::Value(Temperature {
                imperial: 41.2,
                metric: 5.1,
            }),
            set_temp: Field::Value(68.0),
            indoor_temp: Field::Value(70.5),
            mode: Mode::Heat,
            heat_total: Field::Value(heat),
            cool_total: Field::Value(cool),
        }
    }

    fn store() -> (tempfile::TempDir, LedgerStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(&dir.path().join("tstat"));
        (dir, store)
    }

    #[test]
    fn header_line() {
        assert_eq!(
            header(),
            "#      Date,       Time,   Out Temp,   Set Temp,    In Temp,  Temp Diff, Heat Total, Cool Total,   Heat Run,   Cool Run,       Mode,"
        );
        assert_eq!(header().len(), COLUMNS.len() * COLUMN_WIDTH);
    }

    #[test]
    fn record_line() {
        let r = reading(at(day(2024, 1, 15), 14, 0), 120, 30);
        let record = LedgerRecord::new(&r, delta::delta(&r, None));
        assert_eq!(
            record.to_string(),
            " 2024/01/15,      14:00,       41.2,       68.0,       70.5,        -27,        120,         30,          0,          0,       HEAT,"
        );
    }

    #[test]
    fn record_line_with_placeholders() {
        let r = Reading {
            outdoor_temp: Field::Unavailable,
            indoor_temp: Field::Unavailable,
            mode: Mode::Unknown,
            heat_total: Field::Anomaly(-1),
            cool_total: Field::Anomaly(-1),
            ..reading(at(day(2024, 1, 16), 0, 2), 0, 0)
        };
        let line = LedgerRecord::new(&r, delta::delta(&r, None)).to_string();
        assert_eq!(
            line,
            " 2024/01/16,      00:02,         --,       68.0,         --,         --,         -1,         -1,          0,          0,    UNKNOWN,"
        );
        let parsed: LedgerRecord = line.parse().unwrap();
        assert_eq!(parsed.outdoor_temp, Field::Unavailable);
        assert_eq!(parsed.temp_diff, Field::Unavailable);
        assert_eq!(parsed.heat_total, Field::Anomaly(-1));
        assert_eq!(parsed.heat_run, Field::Value(0));
        assert_eq!(parsed.mode, Mode::Unknown);
    }

    #[test]
    fn whole_temperatures_keep_decimal() {
        let r = Reading {
            outdoor_temp: Field::Value(Temperature {
                imperial: 41.0,
                metric: 5.0,
            }),
            indoor_temp: Field::Value(70.0),
            ..reading(at(day(2024, 1, 15), 14, 0), 120, 30)
        };
        let line = LedgerRecord::new(&r, delta::delta(&r, None)).to_string();
        assert!(line.starts_with(
            " 2024/01/15,      14:00,       41.0,       68.0,       70.0,        -27,"
        ));
        let parsed: LedgerRecord = line.parse().unwrap();
        assert_eq!(parsed.indoor_temp, Field::Value(70.0));
    }

    #[test]
    fn parse_negative_run_is_value() {
        let line = " 2024/01/15,      15:00,         --,         68,         70,         --,         10,          0,       -110,          0,       HEAT,";
        let parsed: LedgerRecord = line.parse().unwrap();
        assert_eq!(parsed.heat_total, Field::Value(10));
        assert_eq!(parsed.heat_run, Field::Value(-110));
        assert_eq!(parsed.temp_diff, Field::Unavailable);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "2024/01/15, 14:00,".parse::<LedgerRecord>(),
            Err(RecordParseError::FieldCount(2))
        ));
        assert!(matches!(
            "2024/01/15, 14:00, 1, 2, 3, +4, abc, 0, 0, 0, HEAT,".parse::<LedgerRecord>(),
            Err(RecordParseError::InvalidField {
                column: "Heat Total",
                ..
            })
        ));
        assert!(matches!(
            "2024/01/15, 14:00, 1, 2, 3, +4, 5, 0, 0, 0, FAN,".parse::<LedgerRecord>(),
            Err(RecordParseError::InvalidField { column: "Mode", .. })
        ));
    }

    #[test]
    fn path_suffix() {
        let store = LedgerStore::new(Path::new("/var/lib/tstat/living_room"));
        assert_eq!(
            store.path(day(2024, 1, 5)),
            PathBuf::from("/var/lib/tstat/living_room_2024_01_05.txt")
        );
    }

    #[test]
    fn ensure_file_is_idempotent() {
        let (_dir, store) = store();
        let d = day(2024, 1, 15);
        let path = store.ensure_file(d).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", header()));

        let r = reading(at(d, 14, 0), 120, 30);
        store.append(d, &LedgerRecord::new(&r, delta::delta(&r, None))).unwrap();
        let before = fs::read_to_string(&path).unwrap();
        store.ensure_file(d).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(before.lines().count(), 2);
    }

    #[test]
    fn last_record_missing_file() {
        let (_dir, store) = store();
        assert!(store.last_record(day(2024, 1, 15)).unwrap().is_none());
    }

    #[test]
    fn last_record_header_only() {
        let (_dir, store) = store();
        let d = day(2024, 1, 15);
        store.ensure_file(d).unwrap();
        assert!(store.last_record(d).unwrap().is_none());
    }

    #[test]
    fn last_record_single_line() {
        let (_dir, store) = store();
        let d = day(2024, 1, 15);
        let r = reading(at(d, 14, 0), 120, 30);
        let record = LedgerRecord::new(&r, delta::delta(&r, None));
        store.append(d, &record).unwrap();
        assert_eq!(store.last_record(d).unwrap(), Some(record));
    }

    #[test]
    fn last_record_large_file() {
        let (_dir, store) = store();
        let d = day(2024, 1, 15);
        let mut last = None;
        for i in 0..1000 {
            let r = reading(at(d, (i / 60) % 24, i % 60), i.into(), 0);
            let record = LedgerRecord::new(&r, delta::delta(&r, last.as_ref()));
            store.append(d, &record).unwrap();
            last = Some(record);
        }
        let tail = store.last_record(d).unwrap().unwrap();
        assert_eq!(Some(&tail), last.as_ref());
        assert_eq!(tail.heat_total, Field::Value(999));
        assert_eq!(tail.heat_run, Field::Value(1));
        assert_eq!(tail.time, NaiveTime::from_hms_opt(16, 39, 0).unwrap());
        let contents = store.full_contents(d).unwrap();
        assert_eq!(contents.lines().count(), 1001);
        assert!(contents.len() > TAIL_BLOCK_SIZE * 10);
    }

    #[test]
    fn last_record_ignores_trailing_blank_lines() {
        let (_dir, store) = store();
        let d = day(2024, 1, 15);
        let r = reading(at(d, 14, 0), 120, 30);
        let record = LedgerRecord::new(&r, delta::delta(&r, None));
        store.append(d, &record).unwrap();
        let mut file = File::options().append(true).open(store.path(d)).unwrap();
        file.write_all(b"\n\n").unwrap();
        assert_eq!(store.last_record(d).unwrap(), Some(record));
    }

    #[test]
    fn last_record_malformed() {
        let (_dir, store) = store();
        let d = day(2024, 1, 15);
        store.ensure_file(d).unwrap();
        let mut file = File::options().append(true).open(store.path(d)).unwrap();
        file.write_all(b" 2024/01/15,      14:00,   garbage\n").unwrap();
        assert!(matches!(
            store.last_record(d),
            Err(LedgerError::Malformed { .. })
        ));
    }

    #[test]
    fn full_contents_missing_file() {
        let (_dir, store) = store();
        assert_eq!(store.full_contents(day(2024, 1, 15)).unwrap(), "");
    }

    #[test]
    fn record_computes_deltas() {
        let (_dir, store) = store();
        let d = day(2024, 1, 15);

        let first = store.record(d, &reading(at(d, 14, 0), 120, 30)).unwrap();
        assert_eq!(first.heat_total, Field::Value(120));
        assert_eq!(first.cool_total, Field::Value(30));
        assert_eq!(first.heat_run, Field::Value(0));
        assert_eq!(first.cool_run, Field::Value(0));

        let second = store.record(d, &reading(at(d, 15, 0), 125, 30)).unwrap();
        assert_eq!(second.heat_total, Field::Value(125));
        assert_eq!(second.heat_run, Field::Value(5));
        assert_eq!(second.cool_run, Field::Value(0));

        let contents = store.full_contents(d).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, [header(), first.to_string(), second.to_string()]);
    }

    #[test]
    fn record_after_malformed_tail() {
        let (_dir, store) = store();
        let d = day(2024, 1, 15);
        store.ensure_file(d).unwrap();
        let mut file = File::options().append(true).open(store.path(d)).unwrap();
        file.write_all(b"corrupted\n").unwrap();

        let record = store.record(d, &reading(at(d, 14, 0), 120, 30)).unwrap();
        assert_eq!(record.heat_run, Field::Value(0));
        assert_eq!(record.cool_run, Field::Value(0));
        // Corrupted line is kept as is
        let contents = store.full_contents(d).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.contains("corrupted\n"));
    }
}
