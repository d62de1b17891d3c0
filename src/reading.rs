//! Point in time thermostat reading

use std::fmt;

use chrono::NaiveDateTime;

use crate::device::Mode;

/// Runtime in minutes
pub(crate) type Minutes = i64;

/// Runtime value recorded when the thermostat never confirmed its day rollover
pub(crate) const ROLLOVER_FAULT_MINUTES: Minutes = -1;

/// Value of a reading field that may have failed to be read
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Field<T> {
    /// Value successfully read
    Value(T),
    /// Value could not be read
    Unavailable,
    /// Out of range marker recorded to make a fault visible in the ledger
    Anomaly(T),
}

impl<T> Field<T> {
    /// Build a field from a fallible read, logging the failure
    pub(crate) fn from_read(res: anyhow::Result<T>, what: &str) -> Self {
        match res {
            Ok(v) => Self::Value(v),
            Err(err) => {
                log::warn!("Failed to read {what}: {err:#}");
                Self::Unavailable
            }
        }
    }

    /// Get value if it was successfully read
    pub(crate) fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unavailable | Self::Anomaly(_) => None,
        }
    }

    /// Get raw number, including anomaly markers
    pub(crate) fn raw(&self) -> Option<&T> {
        match self {
            Self::Value(v) | Self::Anomaly(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    /// Transform the inner value, keeping the tag
    pub(crate) fn map<U, F>(self, f: F) -> Field<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Value(v) => Field::Value(f(v)),
            Self::Unavailable => Field::Unavailable,
            Self::Anomaly(v) => Field::Anomaly(f(v)),
        }
    }
}

/// Placeholder written for unavailable values
pub(crate) const UNAVAILABLE: &str = "--";

impl<T> fmt::Display for Field<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) | Self::Anomaly(v) => v.fmt(f),
            Self::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

/// Temperature in both unit systems
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Temperature {
    /// Fahrenheit
    pub imperial: f64,
    /// Celsius
    pub metric: f64,
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°F / {}°C", self.imperial, self.metric)
    }
}

/// Everything known about the thermostat at poll time
#[derive(Clone, Debug)]
pub(crate) struct Reading {
    /// Local poll time
    pub timestamp: NaiveDateTime,
    /// Outdoor temperature from the weather service
    pub outdoor_temp: Field<Temperature>,
    /// Target temperature for the current mode (Fahrenheit)
    pub set_temp: Field<f64>,
    /// Indoor temperature (Fahrenheit)
    pub indoor_temp: Field<f64>,
    /// HVAC mode
    pub mode: Mode,
    /// Heating runtime accumulated in the ledger day so far
    pub heat_total: Field<Minutes>,
    /// Cooling runtime accumulated in the ledger day so far
    pub cool_total: Field<Minutes>,
}

/// Format minutes as `XhYm`
pub(crate) fn hours_minutes(minutes: Minutes) -> String {
    let minutes = minutes.unsigned_abs();
    format!("{}h {}m", minutes / 60, minutes % 60)
}
