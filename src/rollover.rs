//! Wait for the thermostat to roll its own day over
//!
//! At its midnight the thermostat moves today's runtime counters into its "yesterday" bucket.
//! When we poll right after our own midnight, the thermostat clock may still be a few seconds
//! or minutes behind, and its "yesterday" bucket would then hold data from two days ago.

use std::{cell::Cell, rc::Rc, thread, time::Duration};

use backon::{BlockingRetryable as _, ConstantBuilder};

use crate::device::Thermostat;

/// Something that can block the current thread
pub(crate) trait Sleeper {
    /// Block for `dur`
    fn sleep(&self, dur: Duration);
}

/// Real thread sleep
pub(crate) struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, dur: Duration) {
        log::debug!("Sleeping {dur:?}");
        thread::sleep(dur);
    }
}

/// Rollover wait parameters
#[derive(Copy, Clone, Debug)]
pub(crate) struct RolloverSettings {
    /// Number of retries after the first query
    pub max_attempts: usize,
    /// Delay between queries
    pub retry_interval: Duration,
    /// Delay after rollover is seen, to let the thermostat finish moving counters
    pub settle_delay: Duration,
}

impl Default for RolloverSettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            retry_interval: Duration::from_secs(30),
            settle_delay: Duration::from_secs(5),
        }
    }
}

/// Reason the rollover is not confirmed yet
#[derive(thiserror::Error, Debug)]
enum Pending {
    /// Thermostat clock has not reached midnight
    #[error("thermostat clock is at hour {0}")]
    Hour(u32),
    /// Thermostat clock could not be read
    #[error("failed to read thermostat clock: {0:#}")]
    Unreadable(anyhow::Error),
}

/// Rollover wait outcome
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Rollover {
    /// Thermostat clock is past its midnight, its "yesterday" bucket can be trusted
    Confirmed {
        /// Number of clock queries
        attempts: usize,
    },
    /// Thermostat clock never reached midnight, the clocks are skewed
    Exhausted {
        /// Number of clock queries
        attempts: usize,
    },
}

/// Bounded wait for the thermostat day rollover
pub(crate) struct RolloverWaiter {
    /// Parameters
    settings: RolloverSettings,
    /// Sleep implementation, shared with the retry loop
    sleeper: Rc<dyn Sleeper>,
}

impl RolloverWaiter {
    /// Build a new waiter
    pub(crate) fn new(settings: RolloverSettings, sleeper: Rc<dyn Sleeper>) -> Self {
        Self { settings, sleeper }
    }

    /// Block until the thermostat clock shows hour 0, or give up
    pub(crate) fn wait(&self, thermostat: &dyn Thermostat) -> Rollover {
        let attempts = Cell::new(0);
        let sleeper = Rc::clone(&self.sleeper);
        let res = (|| -> Result<(), Pending> {
            attempts.set(attempts.get() + 1);
            match thermostat.internal_hour().map_err(Pending::Unreadable)? {
                0 => Ok(()),
                hour => Err(Pending::Hour(hour)),
            }
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(self.settings.retry_interval)
                .with_max_times(self.settings.max_attempts),
        )
        .sleep(move |dur| sleeper.sleep(dur))
        .notify(|err, dur| {
            log::info!(
                "Thermostat {thermostat} has not rolled over its day ({err}), retrying in {dur:?}"
            );
        })
        .call();

        let attempts = attempts.get();
        match res {
            Ok(()) => {
                log::info!(
                    "Thermostat {thermostat} rolled over its day after {attempts} attempt(s)"
                );
                self.sleeper.sleep(self.settings.settle_delay);
                Rollover::Confirmed { attempts }
            }
            Err(err) => {
                log::error!(
                    "Thermostat {thermostat} did not roll over its day after {attempts} attempts ({err}), \
                     its clock is likely out of sync by more than {:?}",
                    self.settings.retry_interval
                        * u32::try_from(self.settings.max_attempts).unwrap_or(u32::MAX)
                );
                Rollover::Exhausted { attempts }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{self, FakeThermostat, RecordingSleeper};

    fn settings() -> RolloverSettings {
        RolloverSettings::default()
    }

    fn wait(
        settings: RolloverSettings,
        tstat: &FakeThermostat,
    ) -> (Rollover, Rc<RecordingSleeper>) {
        let sleeper = Rc::new(RecordingSleeper::default());
        let res = tests::waiter(settings, &sleeper).wait(tstat);
        (res, sleeper)
    }

    #[test]
    fn confirmed_immediately() {
        let tstat = FakeThermostat::default().with_hours(&[0]);
        let (res, sleeper) = wait(settings(), &tstat);
        assert_eq!(res, Rollover::Confirmed { attempts: 1 });
        assert_eq!(tstat.hour_queries(), 1);
        // Only the settle delay
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn confirmed_after_retries() {
        let tstat = FakeThermostat::default().with_hours(&[23, 23, 0]);
        let (res, sleeper) = wait(settings(), &tstat);
        assert_eq!(res, Rollover::Confirmed { attempts: 3 });
        assert_eq!(
            sleeper.slept(),
            vec![
                Duration::from_secs(30),
                Duration::from_secs(30),
                Duration::from_secs(5)
            ]
        );
    }

    #[test]
    fn exhausted_when_never_rolled_over() {
        let tstat = FakeThermostat::default().with_hours(&[23]);
        let (res, sleeper) = wait(settings(), &tstat);
        assert_eq!(res, Rollover::Exhausted { attempts: 5 });
        assert_eq!(tstat.hour_queries(), 5);
        // No settle delay
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(30); 4]);
    }

    #[test]
    fn attempt_bound_follows_settings() {
        for max_attempts in [0, 1, 7] {
            let tstat = FakeThermostat::default().with_hours(&[23]);
            let settings = RolloverSettings {
                max_attempts,
                retry_interval: Duration::from_millis(1),
                settle_delay: Duration::ZERO,
            };
            let (res, _) = wait(settings, &tstat);
            assert_eq!(
                res,
                Rollover::Exhausted {
                    attempts: max_attempts + 1
                }
            );
            assert_eq!(tstat.hour_queries(), max_attempts + 1);
        }
    }

    #[test]
    fn unreadable_clock_is_retried() {
        // No scripted hours: every clock read fails
        let tstat = FakeThermostat::default();
        let (res, _) = wait(settings(), &tstat);
        assert_eq!(res, Rollover::Exhausted { attempts: 5 });
    }
}
