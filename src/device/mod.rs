//! Thermostat device access

mod http;

use std::fmt;

pub(crate) use http::HttpThermostat;

use crate::reading::Minutes;

/// HVAC operating mode
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum Mode {
    /// Heating
    Heat,
    /// Cooling
    Cool,
    /// Off, auto, or could not be read
    Unknown,
}

/// Time of day as seen by the thermostat clock
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub(crate) struct ClockTime {
    /// Hour [0-23]
    pub hour: u32,
    /// Minute [0-59]
    pub minute: u32,
}

/// Thermostat state document, every field may be missing
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub(crate) struct Snapshot {
    /// Indoor temperature
    pub temp: Option<f64>,
    /// Thermostat mode code
    pub tmode: Option<u8>,
    /// Heating target temperature
    pub t_heat: Option<f64>,
    /// Cooling target temperature
    pub t_cool: Option<f64>,
    /// Thermostat clock
    pub time: Option<ClockTime>,
}

impl Snapshot {
    /// HVAC mode
    pub(crate) fn mode(&self) -> anyhow::Result<Mode> {
        let tmode = self
            .tmode
            .ok_or_else(|| anyhow::anyhow!("Missing mode in thermostat state"))?;
        Ok(match tmode {
            1 => Mode::Heat,
            2 => Mode::Cool,
            _ => Mode::Unknown,
        })
    }

    /// Target temperature for the current mode
    pub(crate) fn set_temp(&self) -> anyhow::Result<f64> {
        let mode = self.mode()?;
        match mode {
            Mode::Heat => self.t_heat,
            Mode::Cool => self.t_cool,
            Mode::Unknown => None,
        }
        .ok_or_else(|| anyhow::anyhow!("No target temperature in mode {mode}"))
    }
}

/// Cumulative heating & cooling runtime of one day
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Runtime {
    /// Heating minutes
    pub heat: Minutes,
    /// Cooling minutes
    pub cool: Minutes,
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "heat {} min, cool {} min", self.heat, self.cool)
    }
}

/// The only runtime history kept by the thermostat
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct RuntimeBuckets {
    /// Runtime since the thermostat's own midnight
    pub today: Runtime,
    /// Runtime of the thermostat's previous day
    pub yesterday: Runtime,
}

/// Thermostat the ledger is built from
pub(crate) trait Thermostat: fmt::Display {
    /// Check if the thermostat answers at all
    fn is_reachable(&self) -> bool;

    /// Read current state
    fn snapshot(&self) -> anyhow::Result<Snapshot>;

    /// Read runtime counters
    fn runtime_buckets(&self) -> anyhow::Result<RuntimeBuckets>;

    /// Set thermostat clock
    fn set_clock(&self, time: ClockTime) -> anyhow::Result<()>;

    /// Read indoor temperature
    fn indoor_temp(&self) -> anyhow::Result<f64> {
        self.snapshot()?
            .temp
            .ok_or_else(|| anyhow::anyhow!("Missing temperature in thermostat state"))
    }

    /// Read target temperature
    fn set_temp(&self) -> anyhow::Result<f64> {
        self.snapshot()?.set_temp()
    }

    /// Read HVAC mode
    fn mode(&self) -> anyhow::Result<Mode> {
        self.snapshot()?.mode()
    }

    /// Read the hour of the thermostat clock
    fn internal_hour(&self) -> anyhow::Result<u32> {
        self.snapshot()?
            .time
            .map(|t| t.hour)
            .ok_or_else(|| anyhow::anyhow!("Missing time in thermostat state"))
    }
}
