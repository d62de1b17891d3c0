//! Midnight boundary window and ledger day resolution

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike as _};

/// Default number of minutes after midnight still attributed to the previous day
pub(crate) const DEFAULT_TOLERANCE_MINUTES: u32 = 5;

/// First minutes after midnight, during which a poll closes out the day that just ended
/// instead of starting the new one.
///
/// This lets a cron job scheduled at `0 * * * *` start a little late and still land its
/// midnight reading in the right ledger file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct BoundaryWindow {
    /// Last minute (inclusive) of hour 0 that is still inside the window
    tolerance_minutes: u32,
}

impl Default for BoundaryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_MINUTES)
    }
}

impl BoundaryWindow {
    /// Build a window of the given tolerance
    pub(crate) fn new(tolerance_minutes: u32) -> Self {
        Self { tolerance_minutes }
    }

    /// Tolerance in minutes
    pub(crate) fn tolerance_minutes(self) -> u32 {
        self.tolerance_minutes
    }

    /// Is `now` within the boundary window
    pub(crate) fn contains(self, now: NaiveDateTime) -> bool {
        now.hour() == 0 && now.minute() <= self.tolerance_minutes
    }

    /// Is `now` within the tolerance of the start of `hour`
    pub(crate) fn is_top_of_hour(self, now: NaiveDateTime, hour: u32) -> bool {
        now.hour() == hour && now.minute() <= self.tolerance_minutes
    }

    /// Day the data polled at `now` belongs to
    pub(crate) fn current_ledger_day(self, now: NaiveDateTime) -> NaiveDate {
        if self.contains(now) {
            now.date() - Days::new(1)
        } else {
            now.date()
        }
    }

    /// Ledger day preceding the current one
    pub(crate) fn previous_ledger_day(self, now: NaiveDateTime) -> NaiveDate {
        self.current_ledger_day(now) - Days::new(1)
    }
}
