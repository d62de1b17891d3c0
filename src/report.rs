//! Daily runtime report

use chrono::NaiveDate;

use crate::{
    invocation::Invocation,
    ledger::{LedgerError, LedgerRecord, LedgerStore},
    reading::{Field, Minutes, hours_minutes},
};

/// Which summary line to use as the mail subject
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum SummarySubject {
    /// Previous ledger day
    #[default]
    Yesterdays,
    /// Current ledger day
    Todays,
    /// Both days combined
    Total,
}

/// Date format in summaries
const DAY_FORMAT: &str = "%Y/%m/%d";

/// Render a cumulative runtime
fn runtime(total: Field<Minutes>) -> String {
    match total {
        Field::Value(v) => hours_minutes(v),
        Field::Anomaly(_) | Field::Unavailable => total.to_string(),
    }
}

/// One line runtime summary
pub(crate) fn summary_line(
    name: &str,
    heat: Field<Minutes>,
    cool: Field<Minutes>,
    day: NaiveDate,
) -> String {
    format!(
        "{name}: Heat runtime: {}, Cool runtime: {} on {}",
        runtime(heat),
        runtime(cool),
        day.format(DAY_FORMAT)
    )
}

/// Ledger of one day, as seen by the report
struct DayLedger {
    /// Summary sentence
    summary: String,
    /// Raw ledger text
    contents: String,
    /// Last record, if readable
    last: Option<LedgerRecord>,
}

impl DayLedger {
    /// Read the ledger of `day`
    fn read(store: &LedgerStore, name: &str, day: NaiveDate) -> anyhow::Result<Self> {
        let label = day.format(DAY_FORMAT);
        let (summary, last) = match store.last_record(day) {
            Ok(Some(record)) => (
                summary_line(name, record.heat_total, record.cool_total, day),
                Some(record),
            ),
            Ok(None) => (format!("{name}: No data for {label}."), None),
            Err(err @ LedgerError::Malformed { .. }) => {
                log::warn!("{err}");
                (format!("{name}: Runtime data unavailable for {label}."), None)
            }
            Err(LedgerError::Io(err)) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to read last record of {:?}", store.path(day))));
            }
        };
        let contents = store.full_contents(day)?;
        Ok(Self {
            summary,
            contents,
            last,
        })
    }

    /// Cumulative totals counted in the combined summary
    fn totals(&self) -> (Minutes, Minutes) {
        self.last.as_ref().map_or((0, 0), |r| {
            (
                r.heat_total.value().copied().unwrap_or(0),
                r.cool_total.value().copied().unwrap_or(0),
            )
        })
    }
}

/// Yesterday and today runtime report
#[derive(Debug)]
pub(crate) struct Report {
    /// Previous ledger day summary
    yesterday: String,
    /// Current ledger day summary
    today: String,
    /// Combined summary
    total: String,
    /// Previous ledger day raw ledger
    yesterday_ledger: String,
    /// Current ledger day raw ledger
    today_ledger: String,
}

impl Report {
    /// Build report from the ledgers of the current and previous ledger days
    pub(crate) fn build(store: &LedgerStore, ctx: &Invocation) -> anyhow::Result<Self> {
        let today_day = ctx.ledger_day();
        let yesterday = DayLedger::read(store, ctx.name(), ctx.previous_ledger_day())?;
        let today = DayLedger::read(store, ctx.name(), today_day)?;

        let (y_heat, y_cool) = yesterday.totals();
        let (t_heat, t_cool) = today.totals();
        let total = summary_line(
            ctx.name(),
            Field::Value(y_heat + t_heat),
            Field::Value(y_cool + t_cool),
            today_day,
        );

        Ok(Self {
            yesterday: yesterday.summary,
            today: today.summary,
            total,
            yesterday_ledger: yesterday.contents,
            today_ledger: today.contents,
        })
    }

    /// Summary line
    pub(crate) fn summary(&self, subject: SummarySubject) -> &str {
        match subject {
            SummarySubject::Yesterdays => &self.yesterday,
            SummarySubject::Todays => &self.today,
            SummarySubject::Total => &self.total,
        }
    }

    /// Full report text
    pub(crate) fn body(&self) -> String {
        format!(
            "Yesterday:\n{}\n{}\n\nToday:\n{}\n{}",
            self.yesterday, self.yesterday_ledger, self.today, self.today_ledger
        )
    }
}
