//! Throttled outside-temperature logging
//!
//! The counter advances once per cycle and a fetch is attempted when it reaches
//! the configured rate. Only a successful fetch resets it, so a failed fetch is
//! retried on the following cycle. Readings whose observation time matches the
//! last stored one are dropped.

use super::isolation::isolate;
use crate::store::{PersistenceStore, WeatherObservation};
use crate::weather::WeatherClient;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

const TAG: &str = "weather";

/// What one throttle tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherTick {
    /// Not this cycle
    Waiting,
    /// Fetch or insert failed
    Failed,
    /// Fetched a reading already stored
    Unchanged,
    Stored,
}

pub struct WeatherThrottle {
    client: Arc<dyn WeatherClient>,
    rate: u32,
    counter: u32,
    last_observed: Option<DateTime<Utc>>,
}

impl WeatherThrottle {
    pub fn new(client: Arc<dyn WeatherClient>, rate: u32) -> Self {
        Self {
            client,
            rate,
            counter: 0,
            last_observed: None,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Take the last stored observation time as the dedup baseline
    pub async fn seed(&mut self, store: &dyn PersistenceStore) {
        match store.latest_weather_observation().await {
            Ok(latest) => {
                self.last_observed = latest.map(|observation| observation.time);
                if let Some(time) = self.last_observed {
                    info!(thermostat = TAG, "last stored observation at {}", time);
                }
            }
            Err(e) => warn!(thermostat = TAG, "could not read last observation: {}", e),
        }
    }

    /// Advance one cycle, fetching and storing when due
    pub async fn tick(&mut self, store: &dyn PersistenceStore) -> WeatherTick {
        if self.rate == 0 {
            return WeatherTick::Waiting;
        }

        self.counter = self.counter.saturating_add(1);
        if self.counter < self.rate {
            return WeatherTick::Waiting;
        }

        let Some(reading) = isolate(TAG, "weather fetch", self.client.current_temperature()).await
        else {
            return WeatherTick::Failed;
        };
        self.counter = 0;

        if self.last_observed == Some(reading.observed_at) {
            return WeatherTick::Unchanged;
        }

        let observation = WeatherObservation {
            time: reading.observed_at,
            external: reading.temperature,
        };
        if isolate(TAG, "weather insert", store.insert_weather_observation(&observation))
            .await
            .is_none()
        {
            return WeatherTick::Failed;
        }

        info!(thermostat = TAG, "external {}", reading.temperature);
        self.last_observed = Some(reading.observed_at);
        WeatherTick::Stored
    }
}
