//! Command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lettre::message::Mailbox;

use crate::{
    notify::{BodyFormat, DEFAULT_FROM, DEFAULT_SENDMAIL},
    report::SummarySubject,
    rollover::RolloverSettings,
    weather::DEFAULT_API_URL,
    window::DEFAULT_TOLERANCE_MINUTES,
};

/// Parse hour of day value
fn hour(s: &str) -> Result<u32, String> {
    clap_num::number_range(s, 0, 23)
}

/// Parse minute tolerance value
fn minutes(s: &str) -> Result<u32, String> {
    clap_num::number_range(s, 0, 59)
}

/// Tstat-ledger command line arguments
#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct Args {
    /// Level of logging output (TRACE, DEBUG, INFO, WARN, ERROR).
    #[arg(short, default_value_t = log::Level::Info)]
    pub verbosity: log::Level,

    /// Also log to this file, rotated when it reaches 2 MB, keeping 3 old files.
    #[arg(short, long)]
    pub logfile: Option<PathBuf>,

    /// Main action
    #[command(subcommand)]
    pub command: Command,
}

/// Mail options
#[derive(clap::Args, Debug)]
pub(crate) struct MailArgs {
    /// Email address to send the report to. No mail is sent if missing.
    #[arg(short, long)]
    pub email: Option<Mailbox>,

    /// Sender email address.
    #[arg(long, default_value = DEFAULT_FROM)]
    pub from: Mailbox,

    /// Sendmail compatible command used to send mail.
    #[arg(long, default_value = DEFAULT_SENDMAIL)]
    pub sendmail: PathBuf,

    /// Only mail the report when run at this hour (0-23), within the boundary tolerance.
    #[arg(short = 'r', long, value_parser = hour)]
    pub report_hour: Option<u32>,

    /// Send mail as plain text instead of HTML.
    #[arg(short = 'm', long)]
    pub text: bool,

    /// Which runtime summary to use as the mail subject.
    #[arg(short, long, value_enum, default_value_t)]
    pub subject: SummarySubject,
}

impl MailArgs {
    /// Mail body format
    pub(crate) fn format(&self) -> BodyFormat {
        if self.text {
            BodyFormat::Text
        } else {
            BodyFormat::Html
        }
    }
}

/// Poll subcommand arguments
#[derive(clap::Args, Debug)]
pub(crate) struct PollArgs {
    /// Thermostat hostname or IP address.
    #[arg(short, long)]
    pub thermostat: String,

    /// Thermostat name used in reports. Defaults to the thermostat host.
    #[arg(short, long)]
    pub nickname: Option<String>,

    /// Ledger file path prefix, a `_YYYY_MM_DD.txt` suffix is appended for each day.
    /// If missing, the reading is only logged (and mailed).
    #[arg(short = 'f', long)]
    pub ledger_prefix: Option<PathBuf>,

    /// Weather Underground API key. Outdoor temperature is not read if missing.
    #[arg(short = 'k', long)]
    pub weather_key: Option<String>,

    /// Weather Underground location query.
    #[arg(short = 'u', long, default_value = "/q/NC/Cary.json")]
    pub weather_location: String,

    /// Weather Underground API base URL.
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub weather_url: String,

    /// Mail options
    #[command(flatten)]
    pub mail: MailArgs,

    /// Set the thermostat clock to the local time after polling.
    #[arg(short = 'y', long)]
    pub sync_clock: bool,

    /// Minutes after midnight during which polls still belong to the previous day.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_MINUTES, value_parser = minutes)]
    pub boundary_tolerance: u32,

    /// Maximum number of retries while waiting for the thermostat to roll over its day.
    #[arg(long, default_value_t = RolloverSettings::default().max_attempts)]
    pub rollover_attempts: usize,

    /// Delay between thermostat clock checks while waiting for its day rollover, ie. '30s'.
    #[arg(long, default_value = "30s")]
    pub rollover_interval: humantime::Duration,

    /// Delay after the thermostat rolled over its day, before reading its runtime.
    #[arg(long, default_value = "5s")]
    pub settle_delay: humantime::Duration,

    /// Timeout of each HTTP request, ie. '10s'.
    #[arg(long, default_value = "10s")]
    pub request_timeout: humantime::Duration,
}

impl PollArgs {
    /// Rollover wait parameters
    pub(crate) fn rollover_settings(&self) -> RolloverSettings {
        RolloverSettings {
            max_attempts: self.rollover_attempts,
            retry_interval: self.rollover_interval.into(),
            settle_delay: self.settle_delay.into(),
        }
    }
}

/// Report subcommand arguments
#[derive(clap::Args, Debug)]
pub(crate) struct ReportArgs {
    /// Ledger file path prefix.
    #[arg(short = 'f', long)]
    pub ledger_prefix: PathBuf,

    /// Thermostat name used in reports.
    #[arg(short, long, default_value = "Thermostat")]
    pub nickname: String,

    /// Mail options
    #[command(flatten)]
    pub mail: MailArgs,

    /// Minutes after midnight during which the previous day is still reported as today.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_MINUTES, value_parser = minutes)]
    pub boundary_tolerance: u32,
}

/// Main command
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Poll the thermostat once, append to the ledger and report
    Poll(PollArgs),

    /// Print and mail the report of existing ledgers, without polling
    Report(ReportArgs),

    /// Generate man pages
    #[cfg(feature = "generate-extras")]
    GenManPages {
        /// Output directory
        dir: PathBuf,
    },

    /// Generate shell completions
    #[cfg(feature = "generate-extras")]
    GenShellCompletions {
        /// Shell to generate completions for, printed on standard output
        #[arg(long, required_unless_present = "dir")]
        shell: Option<clap_complete::Shell>,

        /// Directory to generate completions for all shells into
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
