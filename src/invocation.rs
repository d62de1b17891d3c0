//! State scoped to a single scheduled run

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::window::BoundaryWindow;

/// Context of one scheduled run, passed to every component instead of global state
#[derive(Clone, Debug)]
pub(crate) struct Invocation {
    /// Local time of the run, used consistently for the whole run
    now: NaiveDateTime,
    /// Midnight boundary window
    window: BoundaryWindow,
    /// Thermostat display name for reports
    name: String,
}

impl Invocation {
    /// Build a new run context
    pub(crate) fn new(now: NaiveDateTime, window: BoundaryWindow, name: String) -> Self {
        Self { now, window, name }
    }

    /// Run time
    pub(crate) fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Boundary window
    pub(crate) fn window(&self) -> BoundaryWindow {
        self.window
    }

    /// Thermostat display name
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Is this run closing out the previous day
    pub(crate) fn in_boundary_window(&self) -> bool {
        self.window.contains(self.now)
    }

    /// Ledger day readings of this run belong to
    pub(crate) fn ledger_day(&self) -> NaiveDate {
        self.window.current_ledger_day(self.now)
    }

    /// Ledger day before [`Self::ledger_day`]
    pub(crate) fn previous_ledger_day(&self) -> NaiveDate {
        self.window.previous_ledger_day(self.now)
    }

    /// Should the report be mailed by this run, given an optional fixed report hour
    pub(crate) fn is_report_time(&self, report_hour: Option<u32>) -> bool {
        report_hour.is_none_or(|h| self.window.is_top_of_hour(self.now, h))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.name, self.now.format("%Y/%m/%d %H:%M"))
    }
}
