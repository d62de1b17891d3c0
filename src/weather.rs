//! Outdoor temperature lookup

use std::time::Duration;

use anyhow::Context as _;
use reqwest::blocking::Client;

use crate::reading::Temperature;

/// Default Weather Underground API root
pub(crate) const DEFAULT_API_URL: &str = "http://api.wunderground.com";

/// Source of current outdoor temperature
pub(crate) trait WeatherSource {
    /// Get current outdoor temperature
    fn outdoor_temp(&self) -> anyhow::Result<Temperature>;
}

/// Current observation section of the conditions response
#[derive(serde::Deserialize)]
struct Observation {
    /// Fahrenheit
    temp_f: f64,
    /// Celsius
    temp_c: f64,
}

/// Conditions endpoint response
#[derive(serde::Deserialize)]
struct Conditions {
    /// Latest observation
    current_observation: Observation,
}

/// Weather Underground conditions API client
pub(crate) struct Wunderground {
    /// Full conditions URL
    url: String,
    /// HTTP client
    client: Client,
}

impl Wunderground {
    /// Build client for an API key and location suffix (ie. `/q/NC/Cary.json`)
    pub(crate) fn new(
        api_url: &str,
        key: &str,
        location: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let location = location.trim_start_matches('/');
        Ok(Self {
            url: format!(
                "{}/api/{key}/conditions/{location}",
                api_url.trim_end_matches('/')
            ),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to build HTTP client")?,
        })
    }
}

impl WeatherSource for Wunderground {
    fn outdoor_temp(&self) -> anyhow::Result<Temperature> {
        log::trace!("GET {}", self.url);
        let conditions: Conditions = self
            .client
            .get(&self.url)
            .send()
            .context("Failed to query weather service")?
            .error_for_status()?
            .json()
            .context("Invalid weather service response")?;
        let temp = Temperature {
            imperial: conditions.current_observation.temp_f,
            metric: conditions.current_observation.temp_c,
        };
        log::debug!("Outdoor temperature: {temp}");
        Ok(temp)
    }
}
