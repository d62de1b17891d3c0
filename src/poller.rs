//! Build a reading from the thermostat

use crate::{
    device::{Mode, Runtime, RuntimeBuckets, Thermostat},
    invocation::Invocation,
    reading::{Field, Minutes, ROLLOVER_FAULT_MINUTES, Reading},
    rollover::{Rollover, RolloverWaiter},
    weather::WeatherSource,
};

/// Error returned when no reading could be made at all
#[derive(thiserror::Error, Debug)]
pub(crate) enum PollError {
    /// Thermostat does not answer
    #[error("Thermostat {0} is unreachable")]
    Unreachable(String),
}

/// Polls the thermostat and optional weather source
pub(crate) struct RuntimePoller<'a> {
    /// Thermostat
    thermostat: &'a dyn Thermostat,
    /// Outdoor temperature source
    weather: Option<&'a dyn WeatherSource>,
    /// Midnight rollover waiter
    waiter: RolloverWaiter,
}

impl<'a> RuntimePoller<'a> {
    /// Build a new poller
    pub(crate) fn new(
        thermostat: &'a dyn Thermostat,
        weather: Option<&'a dyn WeatherSource>,
        waiter: RolloverWaiter,
    ) -> Self {
        Self {
            thermostat,
            weather,
            waiter,
        }
    }

    /// Read everything, degrading each field that fails to be read independently
    pub(crate) fn poll(&self, ctx: &Invocation) -> Result<Reading, PollError> {
        if !self.thermostat.is_reachable() {
            return Err(PollError::Unreachable(self.thermostat.to_string()));
        }

        let outdoor_temp = self.weather.map_or(Field::Unavailable, |w| {
            Field::from_read(w.outdoor_temp(), "outdoor temperature")
        });
        let indoor_temp = Field::from_read(self.thermostat.indoor_temp(), "indoor temperature");
        let set_temp = Field::from_read(self.thermostat.set_temp(), "target temperature");
        let mode = self.thermostat.mode().unwrap_or_else(|err| {
            log::warn!("Failed to read thermostat mode: {err:#}");
            Mode::Unknown
        });
        let (heat_total, cool_total) = self.runtime(ctx);

        Ok(Reading {
            timestamp: ctx.now(),
            outdoor_temp,
            set_temp,
            indoor_temp,
            mode,
            heat_total,
            cool_total,
        })
    }

    /// Read cumulative runtime of the ledger day from the matching thermostat bucket
    fn runtime(&self, ctx: &Invocation) -> (Field<Minutes>, Field<Minutes>) {
        let bucket: fn(RuntimeBuckets) -> Runtime = if ctx.in_boundary_window() {
            log::info!(
                "{ctx} is within {} minutes of midnight, reading the previous day's runtime",
                ctx.window().tolerance_minutes()
            );
            match self.waiter.wait(self.thermostat) {
                Rollover::Confirmed { attempts } => {
                    log::debug!("Rollover confirmed after {attempts} clock read(s)");
                    |b| b.yesterday
                }
                Rollover::Exhausted { attempts } => {
                    log::warn!(
                        "Recording {ROLLOVER_FAULT_MINUTES} runtime after {attempts} clock reads"
                    );
                    return (
                        Field::Anomaly(ROLLOVER_FAULT_MINUTES),
                        Field::Anomaly(ROLLOVER_FAULT_MINUTES),
                    );
                }
            }
        } else {
            |b| b.today
        };
        match self.thermostat.runtime_buckets() {
            Ok(buckets) => {
                let runtime = bucket(buckets);
                log::debug!("Ledger day {} runtime: {runtime}", ctx.ledger_day());
                (Field::Value(runtime.heat), Field::Value(runtime.cool))
            }
            Err(err) => {
                log::warn!("Failed to read thermostat runtime: {err:#}");
                (Field::Unavailable, Field::Unavailable)
            }
        }
    }
}
