//! Simple in-memory store
//!
//! This provides a basic implementation for persistence without external database dependencies.
//! Data is stored in memory and will be lost when the application restarts.

use super::{LogSample, PersistenceStore, SettingsRecord, WeatherObservation};
use crate::device::snapshot::{ComfortSchedule, TimerSchedule};
use crate::engine::Event;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Tables {
    settings: HashMap<String, SettingsRecord>,
    comfort: HashMap<String, ComfortSchedule>,
    timer: HashMap<String, TimerSchedule>,
    samples: Vec<LogSample>,
    events: Vec<Event>,
    weather: Vec<WeatherObservation>,
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("Initializing in-memory store");
        Self::default()
    }

    pub async fn settings(&self, thermostat: &str) -> Option<SettingsRecord> {
        self.tables.read().await.settings.get(thermostat).cloned()
    }

    pub async fn comfort_schedule(&self, thermostat: &str) -> Option<ComfortSchedule> {
        self.tables.read().await.comfort.get(thermostat).cloned()
    }

    pub async fn timer_schedule(&self, thermostat: &str) -> Option<TimerSchedule> {
        self.tables.read().await.timer.get(thermostat).cloned()
    }

    pub async fn samples(&self) -> Vec<LogSample> {
        self.tables.read().await.samples.clone()
    }

    /// Events in insertion order
    pub async fn events(&self) -> Vec<Event> {
        self.tables.read().await.events.clone()
    }

    pub async fn weather_observations(&self) -> Vec<WeatherObservation> {
        self.tables.read().await.weather.clone()
    }

    /// Get storage statistics
    pub async fn stats(&self) -> MemoryStoreStats {
        let tables = self.tables.read().await;
        MemoryStoreStats {
            thermostats: tables.settings.len(),
            samples: tables.samples.len(),
            events: tables.events.len(),
            weather_observations: tables.weather.len(),
        }
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn upsert_settings(&self, thermostat: &str, settings: &SettingsRecord) -> Result<()> {
        self.tables
            .write()
            .await
            .settings
            .insert(thermostat.to_string(), settings.clone());
        Ok(())
    }

    async fn upsert_comfort_schedule(
        &self,
        thermostat: &str,
        schedule: &ComfortSchedule,
    ) -> Result<()> {
        self.tables
            .write()
            .await
            .comfort
            .insert(thermostat.to_string(), schedule.clone());
        Ok(())
    }

    async fn upsert_timer_schedule(
        &self,
        thermostat: &str,
        schedule: &TimerSchedule,
    ) -> Result<()> {
        self.tables
            .write()
            .await
            .timer
            .insert(thermostat.to_string(), schedule.clone());
        Ok(())
    }

    async fn insert_log_sample(&self, sample: &LogSample) -> Result<()> {
        self.tables.write().await.samples.push(sample.clone());
        Ok(())
    }

    async fn insert_event(&self, event: &Event) -> Result<()> {
        debug!(
            thermostat = %event.thermostat,
            "storing {} event: {}",
            event.class().as_str(),
            event.state()
        );
        self.tables.write().await.events.push(event.clone());
        Ok(())
    }

    async fn insert_weather_observation(&self, observation: &WeatherObservation) -> Result<()> {
        self.tables.write().await.weather.push(observation.clone());
        Ok(())
    }

    async fn latest_weather_observation(&self) -> Result<Option<WeatherObservation>> {
        Ok(self
            .tables
            .read()
            .await
            .weather
            .iter()
            .max_by_key(|observation| observation.time)
            .cloned())
    }
}

/// In-memory store statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryStoreStats {
    pub thermostats: usize,
    pub samples: usize,
    pub events: usize,
    pub weather_observations: usize,
}
