//! Runtime deltas between polls

use crate::{
    ledger::LedgerRecord,
    reading::{Field, Minutes, Reading, Temperature},
};

/// Runtime since the previous record of the same ledger day
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Delta {
    /// Heating minutes
    pub heat: Field<Minutes>,
    /// Cooling minutes
    pub cool: Field<Minutes>,
}

/// Difference between two cumulative counters, never clamped
fn counter_delta(current: Field<Minutes>, previous: Field<Minutes>) -> Field<Minutes> {
    match (current, previous) {
        (Field::Value(c), Field::Value(p)) => Field::Value(c - p),
        (Field::Value(c) | Field::Anomaly(c), Field::Value(p) | Field::Anomaly(p)) => {
            Field::Anomaly(c - p)
        }
        (Field::Unavailable, _) | (_, Field::Unavailable) => Field::Unavailable,
    }
}

/// Compute runtime delta of `current` against the last record of its ledger day.
///
/// Without a previous record this is the first reading of the day, and the delta is 0: the
/// counters may already include runtime from before the ledger started.
pub(crate) fn delta(current: &Reading, previous: Option<&LedgerRecord>) -> Delta {
    match previous {
        None => Delta {
            heat: Field::Value(0),
            cool: Field::Value(0),
        },
        Some(previous) => Delta {
            heat: counter_delta(current.heat_total, previous.heat_total),
            cool: counter_delta(current.cool_total, previous.cool_total),
        },
    }
}

/// Outdoor minus target temperature, rounded (Fahrenheit)
pub(crate) fn temp_diff(outdoor: Field<Temperature>, set: Field<f64>) -> Field<i64> {
    match (outdoor, set) {
        (Field::Value(outdoor), Field::Value(set)) => {
            #[expect(clippy::cast_possible_truncation)]
            let diff = (outdoor.imperial - set).round() as i64;
            Field::Value(diff)
        }
        _ => Field::Unavailable,
    }
}

/// Temperature difference with explicit sign
pub(crate) fn signed(diff: Field<i64>) -> String {
    diff.raw()
        .map_or_else(|| diff.to_string(), |v| format!("{v:+}"))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::device::Mode;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn reading(heat: Field<Minutes>, cool: Field<Minutes>) -> Reading {
        Reading {
            timestamp: noon(),
            outdoor_temp: Field::Unavailable,
            set_temp: Field::Value(68.0),
            indoor_temp: Field::Value(70.0),
            mode: Mode::Heat,
            heat_total: heat,
            cool_total: cool,
        }
    }

    fn record(heat: Field<Minutes>, cool: Field<Minutes>) -> LedgerRecord {
        LedgerRecord::new(&reading(heat, cool), delta(&reading(heat, cool), None))
    }

    #[test]
    fn first_reading_of_day() {
        for (heat, cool) in [(0, 0), (120, 30), (1439, 1439)] {
            let d = delta(&reading(Field::Value(heat), Field::Value(cool)), None);
            assert_eq!(d.heat, Field::Value(0));
            assert_eq!(d.cool, Field::Value(0));
        }
    }

    #[test]
    fn first_reading_of_day_with_anomaly() {
        let d = delta(&reading(Field::Anomaly(-1), Field::Anomaly(-1)), None);
        assert_eq!(d.heat, Field::Value(0));
        assert_eq!(d.cool, Field::Value(0));
    }

    #[test]
    fn monotonic_within_day() {
        let prev = record(Field::Value(120), Field::Value(30));
        let d = delta(&reading(Field::Value(125), Field::Value(30)), Some(&prev));
        assert_eq!(d.heat, Field::Value(5));
        assert_eq!(d.cool, Field::Value(0));
    }

    #[test]
    fn negative_delta_preserved() {
        let prev = record(Field::Value(120), Field::Value(30));
        let d = delta(&reading(Field::Value(10), Field::Value(0)), Some(&prev));
        assert_eq!(d.heat, Field::Value(-110));
        assert_eq!(d.cool, Field::Value(-30));
    }

    #[test]
    fn anomaly_propagates() {
        let prev = record(Field::Value(470), Field::Value(0));
        let d = delta(&reading(Field::Anomaly(-1), Field::Anomaly(-1)), Some(&prev));
        assert_eq!(d.heat, Field::Anomaly(-471));
        assert_eq!(d.cool, Field::Anomaly(-1));

        let prev = record(Field::Anomaly(-1), Field::Value(0));
        let d = delta(&reading(Field::Value(10), Field::Value(0)), Some(&prev));
        assert_eq!(d.heat, Field::Anomaly(11));
        assert_eq!(d.cool, Field::Value(0));
    }

    #[test]
    fn unavailable_propagates() {
        let prev = record(Field::Unavailable, Field::Value(30));
        let d = delta(&reading(Field::Value(10), Field::Unavailable), Some(&prev));
        assert_eq!(d.heat, Field::Unavailable);
        assert_eq!(d.cool, Field::Unavailable);
    }

    #[test]
    fn outdoor_diff() {
        let outdoor = Field::Value(Temperature {
            imperial: 41.6,
            metric: 5.3,
        });
        assert_eq!(temp_diff(outdoor, Field::Value(68.0)), Field::Value(-26));
        assert_eq!(temp_diff(outdoor, Field::Value(40.0)), Field::Value(2));
        assert_eq!(temp_diff(Field::Unavailable, Field::Value(68.0)), Field::Unavailable);
        assert_eq!(temp_diff(outdoor, Field::Unavailable), Field::Unavailable);
    }

    #[test]
    fn signed_diff() {
        assert_eq!(signed(Field::Value(3)), "+3");
        assert_eq!(signed(Field::Value(-26)), "-26");
        assert_eq!(signed(Field::Value(0)), "+0");
        assert_eq!(signed(Field::Unavailable), "--");
    }
}
