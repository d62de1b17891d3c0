//! Radio Thermostat (3M-50 / CT-50) local HTTP API

use std::{fmt, time::Duration};

use anyhow::Context as _;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

use super::{ClockTime, Runtime, RuntimeBuckets, Snapshot, Thermostat};
use crate::reading::Minutes;

/// Thermostat state endpoint
const STATE_PATH: &str = "/tstat";
/// Runtime counters endpoint
const DATALOG_PATH: &str = "/tstat/datalog";

/// Duration as reported by the datalog endpoint
#[derive(serde::Deserialize)]
struct HourMinute {
    /// Hours
    hour: Minutes,
    /// Minutes
    minute: Minutes,
}

impl HourMinute {
    /// Total minutes
    fn minutes(&self) -> Minutes {
        self.hour * 60 + self.minute
    }
}

/// One day of the datalog endpoint
#[derive(serde::Deserialize)]
struct DatalogDay {
    /// Heating runtime
    heat_runtime: HourMinute,
    /// Cooling runtime
    cool_runtime: HourMinute,
}

impl From<DatalogDay> for Runtime {
    fn from(day: DatalogDay) -> Self {
        Self {
            heat: day.heat_runtime.minutes(),
            cool: day.cool_runtime.minutes(),
        }
    }
}

/// Datalog endpoint response
#[derive(serde::Deserialize)]
struct Datalog {
    /// Thermostat's current day
    today: DatalogDay,
    /// Thermostat's previous day
    yesterday: DatalogDay,
}

/// Clock update request body
#[derive(serde::Serialize)]
struct SetClock {
    /// New time
    time: ClockTime,
}

/// Thermostat reached over HTTP
pub(crate) struct HttpThermostat {
    /// Host name or address as given by the user
    host: String,
    /// URL prefix, without trailing slash
    base_url: String,
    /// HTTP client
    client: Client,
}

impl HttpThermostat {
    /// Build a client for a thermostat host, or a full base URL
    pub(crate) fn new(host: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = if host.contains("://") {
            host.trim_end_matches('/').to_owned()
        } else {
            format!("http://{host}")
        };
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            host: host.to_owned(),
            base_url,
            client,
        })
    }

    /// GET a JSON document
    fn get<T>(&self, path: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        log::trace!("GET {url}");
        self.client
            .get(&url)
            .send()
            .with_context(|| format!("Failed to send request to {url}"))?
            .error_for_status()?
            .json()
            .with_context(|| format!("Invalid response from {url}"))
    }
}

impl fmt::Display for HttpThermostat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)
    }
}

impl Thermostat for HttpThermostat {
    fn is_reachable(&self) -> bool {
        let url = format!("{}{STATE_PATH}", self.base_url);
        match self
            .client
            .get(&url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
        {
            Ok(_) => true,
            Err(err) => {
                log::error!("Thermostat {self} is not reachable: {err}");
                false
            }
        }
    }

    fn snapshot(&self) -> anyhow::Result<Snapshot> {
        let snapshot: Snapshot = self.get(STATE_PATH)?;
        log::debug!("Thermostat {self} state: {snapshot:?}");
        Ok(snapshot)
    }

    fn runtime_buckets(&self) -> anyhow::Result<RuntimeBuckets> {
        let datalog: Datalog = self.get(DATALOG_PATH)?;
        let buckets = RuntimeBuckets {
            today: datalog.today.into(),
            yesterday: datalog.yesterday.into(),
        };
        log::debug!("Thermostat {self} runtime: {buckets:?}");
        Ok(buckets)
    }

    fn set_clock(&self, time: ClockTime) -> anyhow::Result<()> {
        let url = format!("{}{STATE_PATH}", self.base_url);
        let response: serde_json::Value = self
            .client
            .post(&url)
            .json(&SetClock { time })
            .send()
            .with_context(|| format!("Failed to send request to {url}"))?
            .error_for_status()?
            .json()
            .with_context(|| format!("Invalid response from {url}"))?;
        anyhow::ensure!(
            response.get("success").is_some(),
            "Thermostat refused clock update: {response}"
        );
        Ok(())
    }
}
