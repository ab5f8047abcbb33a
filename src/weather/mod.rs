//! External temperature source
//!
//! `OpenWeatherClient` reads the current-conditions endpoint of an
//! OpenWeatherMap-compatible service.

use crate::error::{Result, ThermologError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// One external temperature reading and the service's own observation time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherReading {
    pub temperature: f64,
    pub observed_at: DateTime<Utc>,
}

/// Source of external temperature readings
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn current_temperature(&self) -> Result<WeatherReading>;
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    main: MainBlock,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
}

/// Client for `<service>/data/2.5/weather`
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    endpoint: Url,
    key: String,
    location: String,
    units: String,
}

impl std::fmt::Debug for OpenWeatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("location", &self.location)
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherClient {
    pub fn new(
        service: &str,
        key: &str,
        location: &str,
        units: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let base = Url::parse(service).map_err(|e| {
            ThermologError::config(format!("Invalid weather service URL '{service}': {e}"))
        })?;
        let endpoint = base
            .join("data/2.5/weather")
            .map_err(|e| ThermologError::config(format!("Invalid weather endpoint: {e}")))?;

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(format!("thermolog/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ThermologError::weather(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            key: key.to_string(),
            location: location.to_string(),
            units: units.to_string(),
        })
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn current_temperature(&self) -> Result<WeatherReading> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("q", self.location.as_str()),
                ("units", self.units.as_str()),
                ("appid", self.key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ThermologError::weather(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ThermologError::weather(format!("HTTP {status}: {body}")));
        }

        let conditions: CurrentConditions = response
            .json()
            .await
            .map_err(|e| ThermologError::weather(format!("unexpected response: {e}")))?;

        let observed_at = DateTime::<Utc>::from_timestamp(conditions.dt, 0).ok_or_else(|| {
            ThermologError::weather(format!("observation time {} out of range", conditions.dt))
        })?;

        debug!(
            "weather for {}: {} at {}",
            self.location, conditions.main.temp, observed_at
        );
        Ok(WeatherReading {
            temperature: conditions.main.temp,
            observed_at,
        })
    }
}
