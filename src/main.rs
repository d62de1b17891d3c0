//! Poll a Wi-Fi thermostat and keep a daily ledger of heating and cooling runtime

use std::{path::Path, rc::Rc, time::Duration};

use anyhow::Context as _;
use chrono::{Local, NaiveDateTime, Timelike as _};
use clap::Parser as _;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

mod cl;
mod delta;
mod device;
#[cfg(feature = "generate-extras")]
mod extras;
mod invocation;
mod ledger;
mod notify;
mod poller;
mod reading;
mod report;
mod rollover;
mod weather;
mod window;

use crate::{
    delta::Delta,
    device::{ClockTime, HttpThermostat, Thermostat},
    invocation::Invocation,
    ledger::{LedgerRecord, LedgerStore},
    notify::{BodyFormat, Notifier, SendmailNotifier},
    poller::RuntimePoller,
    reading::{Field, Reading},
    report::{Report, SummarySubject},
    rollover::{RolloverWaiter, ThreadSleeper},
    weather::{WeatherSource, Wunderground},
    window::BoundaryWindow,
};

/// Where and how to mail reports
struct Mailer<'a> {
    /// Delivery
    notifier: &'a dyn Notifier,
    /// Only mail reports at this hour
    report_hour: Option<u32>,
    /// Summary used as subject
    subject: SummarySubject,
    /// Body format
    format: BodyFormat,
}

impl<'a> Mailer<'a> {
    /// Build mailer from command line options, if a recipient is set
    fn new(args: &cl::MailArgs, notifier: Option<&'a SendmailNotifier>) -> Option<Self> {
        notifier.map(|notifier| Self {
            notifier,
            report_hour: args.report_hour,
            subject: args.subject,
            format: args.format(),
        })
    }

    /// Send a message, only logging failures
    fn send(&self, subject: &str, body: &str, format: BodyFormat) {
        notify::notify(self.notifier, subject, body, format);
    }
}

/// Build the sendmail notifier from command line options
fn sendmail(args: &cl::MailArgs) -> Option<SendmailNotifier> {
    args.email.as_ref().map(|to| {
        SendmailNotifier::new(args.sendmail.as_os_str(), args.from.clone(), to.clone())
    })
}

/// Log file size triggering rotation
const LOGFILE_ROTATE_SIZE: u64 = 2 * 1024 * 1024;

/// Number of rotated log files kept
const LOGFILE_KEEP_COUNT: usize = 3;

/// Setup logging to stderr, and to a rotated file if requested
///
/// The returned handle must be kept alive for file logging to work.
fn init_logger(
    level: log::Level,
    logfile: Option<&Path>,
) -> anyhow::Result<Option<LoggerHandle>> {
    let Some(logfile) = logfile else {
        simple_logger::init_with_level(level).context("Failed to init logger")?;
        return Ok(None);
    };
    let duplicate = match level {
        log::Level::Error => Duplicate::Error,
        log::Level::Warn => Duplicate::Warn,
        log::Level::Info => Duplicate::Info,
        log::Level::Debug => Duplicate::Debug,
        log::Level::Trace => Duplicate::Trace,
    };
    let handle = Logger::try_with_str(level.as_str().to_lowercase())
        .context("Invalid log level")?
        .log_to_file(
            FileSpec::try_from(logfile)
                .with_context(|| format!("Invalid log file path {logfile:?}"))?,
        )
        .append()
        .rotate(
            Criterion::Size(LOGFILE_ROTATE_SIZE),
            Naming::NumbersDirect,
            Cleanup::KeepLogFiles(LOGFILE_KEEP_COUNT),
        )
        .format_for_files(flexi_logger::detailed_format)
        .duplicate_to_stderr(duplicate)
        .start()
        .with_context(|| format!("Failed to init logging to {logfile:?}"))?;
    Ok(Some(handle))
}

/// Report an unreachable thermostat
fn report_failure(
    thermostat: &dyn Thermostat,
    nickname: Option<&str>,
    mailer: Option<&Mailer<'_>>,
) {
    let name = nickname.map_or_else(
        || thermostat.to_string(),
        |n| format!("{n}({thermostat})"),
    );
    let subject = format!("{name} is incommunicado.");
    log::error!("{subject}");
    if let Some(mailer) = mailer {
        mailer.send(&subject, "", BodyFormat::Text);
    }
}

/// Log a reading without ledger, and mail it
fn dump_reading(ctx: &Invocation, reading: &Reading, mailer: Option<&Mailer<'_>>) {
    let record = LedgerRecord::new(
        reading,
        Delta {
            heat: Field::Unavailable,
            cool: Field::Unavailable,
        },
    );
    let header = ledger::header();
    log::info!("{header}");
    log::info!("{record}");
    if let Some(mailer) = mailer {
        let subject = format!(
            "{} at {}",
            report::summary_line(
                ctx.name(),
                reading.heat_total,
                reading.cool_total,
                ctx.ledger_day()
            ),
            ctx.now().format("%H:%M")
        );
        mailer.send(&subject, &format!("{header}\n{record}"), mailer.format);
    }
}

/// Log the report, and mail it if it is time to
fn send_report(
    store: &LedgerStore,
    ctx: &Invocation,
    mailer: Option<&Mailer<'_>>,
) -> anyhow::Result<()> {
    let report = Report::build(store, ctx).context("Failed to build report")?;
    log::info!("{}", report.summary(SummarySubject::Todays));
    log::info!("{}", report.body());
    if let Some(mailer) = mailer {
        if ctx.is_report_time(mailer.report_hour) {
            mailer.send(report.summary(mailer.subject), &report.body(), mailer.format);
        } else {
            log::debug!("Not report time for {ctx}, mail not sent");
        }
    }
    Ok(())
}

/// Set the thermostat clock to `now`
fn sync_clock(thermostat: &dyn Thermostat, now: NaiveDateTime) {
    let time = ClockTime {
        hour: now.hour(),
        minute: now.minute(),
    };
    match thermostat.set_clock(time) {
        Ok(()) => log::info!(
            "Thermostat {thermostat} clock set to {}",
            now.format("%H:%M")
        ),
        Err(err) => log::error!("Failed to set thermostat {thermostat} clock: {err:#}"),
    }
}

/// Run one poll
fn poll(
    args: &cl::PollArgs,
    ctx: &Invocation,
    thermostat: &dyn Thermostat,
    poller: &RuntimePoller<'_>,
    mailer: Option<&Mailer<'_>>,
) -> anyhow::Result<()> {
    let reading = match poller.poll(ctx) {
        Ok(reading) => reading,
        Err(err) => {
            report_failure(thermostat, args.nickname.as_deref(), mailer);
            return Err(err.into());
        }
    };

    if let Some(prefix) = &args.ledger_prefix {
        let store = LedgerStore::new(prefix);
        store
            .record(ctx.ledger_day(), &reading)
            .context("Failed to update ledger")?;
        send_report(&store, ctx, mailer)?;
    } else {
        dump_reading(ctx, &reading, mailer);
    }

    if args.sync_clock {
        sync_clock(thermostat, ctx.now());
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Parse cl args
    let args = cl::Args::parse();

    // Init logger
    let _logger = init_logger(args.verbosity, args.logfile.as_deref())?;

    // Used consistently for the whole run
    let now = Local::now().naive_local();

    match args.command {
        cl::Command::Poll(poll_args) => {
            let timeout: Duration = poll_args.request_timeout.into();
            let thermostat = HttpThermostat::new(&poll_args.thermostat, timeout)
                .context("Failed to setup thermostat client")?;
            let weather = poll_args
                .weather_key
                .as_ref()
                .map(|key| {
                    Wunderground::new(
                        &poll_args.weather_url,
                        key,
                        &poll_args.weather_location,
                        timeout,
                    )
                })
                .transpose()
                .context("Failed to setup weather client")?;
            let name = poll_args
                .nickname
                .clone()
                .unwrap_or_else(|| thermostat.to_string());
            let ctx = Invocation::new(
                now,
                BoundaryWindow::new(poll_args.boundary_tolerance),
                name,
            );
            let notifier = sendmail(&poll_args.mail);
            let mailer = Mailer::new(&poll_args.mail, notifier.as_ref());
            let poller = RuntimePoller::new(
                &thermostat,
                weather.as_ref().map(|w| w as &dyn WeatherSource),
                RolloverWaiter::new(poll_args.rollover_settings(), Rc::new(ThreadSleeper)),
            );
            poll(&poll_args, &ctx, &thermostat, &poller, mailer.as_ref())?;
        }
        cl::Command::Report(report_args) => {
            let ctx = Invocation::new(
                now,
                BoundaryWindow::new(report_args.boundary_tolerance),
                report_args.nickname.clone(),
            );
            let notifier = sendmail(&report_args.mail);
            let mailer = Mailer::new(&report_args.mail, notifier.as_ref());
            send_report(
                &LedgerStore::new(&report_args.ledger_prefix),
                &ctx,
                mailer.as_ref(),
            )?;
        }
        #[cfg(feature = "generate-extras")]
        cl::Command::GenManPages { dir } => {
            extras::generate_man_pages(&dir).context("Failed to generate man pages")?;
        }
        #[cfg(feature = "generate-extras")]
        cl::Command::GenShellCompletions { shell, dir } => {
            extras::generate_shell_completions(shell, dir.as_deref())
                .context("Failed to generate shell completions")?;
        }
    }

    Ok(())
}
