//! Persistence layer for settings, samples, events and weather observations
//!
//! Available implementations:
//! - In-memory storage (always available, data is lost on restart)
//! - libsql storage, local file or remote Turso (with "libsql" feature)

pub mod memory;

#[cfg(feature = "libsql")]
pub mod libsql_store;

use crate::device::snapshot::{ComfortSchedule, ThermostatSnapshot, TimerSchedule};
use crate::engine::Event;
use crate::error::{Result, ThermologError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use memory::MemoryStore;

#[cfg(feature = "libsql")]
pub use libsql_store::LibsqlStore;

/// Device configuration mirrored into the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingsRecord {
    pub model: String,
    pub firmware: Option<String>,
    pub units: String,
    pub program_mode: String,
    pub optimum_start_hours: f64,
    pub frost_enabled: bool,
    pub frost_target: f64,
    pub has_heating: bool,
    pub has_hotwater: bool,
}

impl SettingsRecord {
    pub fn from_snapshot(snapshot: &ThermostatSnapshot) -> Self {
        Self {
            model: snapshot.product.model.clone(),
            firmware: snapshot.product.firmware.clone(),
            units: snapshot.config.units.as_str().to_string(),
            program_mode: snapshot.config.program_mode.clone(),
            optimum_start_hours: snapshot.config.optimum_start_hours,
            frost_enabled: snapshot.frost_protect.enabled,
            frost_target: snapshot.frost_protect.target,
            has_heating: snapshot.heating.is_some(),
            has_hotwater: snapshot.hotwater.is_some(),
        }
    }
}

/// One periodic temperature sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogSample {
    pub thermostat: String,
    pub time: NaiveDateTime,
    pub air: Option<f64>,
    pub target: f64,
    pub comfort: Option<f64>,
}

/// External temperature reading
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherObservation {
    pub time: DateTime<Utc>,
    pub external: f64,
}

/// Storage contract used by the monitor
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Insert or replace the settings row for a thermostat
    async fn upsert_settings(&self, thermostat: &str, settings: &SettingsRecord) -> Result<()>;

    /// Insert or replace the comfort schedule for a thermostat
    async fn upsert_comfort_schedule(&self, thermostat: &str, schedule: &ComfortSchedule)
        -> Result<()>;

    /// Insert or replace the timer schedule for a thermostat
    async fn upsert_timer_schedule(&self, thermostat: &str, schedule: &TimerSchedule) -> Result<()>;

    async fn insert_log_sample(&self, sample: &LogSample) -> Result<()>;

    async fn insert_event(&self, event: &Event) -> Result<()>;

    async fn insert_weather_observation(&self, observation: &WeatherObservation) -> Result<()>;

    /// Most recent weather observation, if any
    async fn latest_weather_observation(&self) -> Result<Option<WeatherObservation>>;
}

/// Open the store named by a persistence source.
///
/// `memory` (or an empty source) selects the in-memory store; anything else is
/// handed to libsql as a local path or `libsql://` URL.
pub async fn open_store(
    source: &str,
    user: Option<&str>,
    credential: Option<&str>,
) -> Result<Arc<dyn PersistenceStore>> {
    if source.is_empty() || source == "memory" {
        return Ok(Arc::new(MemoryStore::new()));
    }

    #[cfg(feature = "libsql")]
    {
        let store = LibsqlStore::open(source, user, credential).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "libsql"))]
    {
        let _ = (user, credential);
        Err(ThermologError::config(format!(
            "persistence source '{source}' needs the libsql feature"
        )))
    }
}

pub(crate) fn schedule_json<T: Serialize>(schedule: &T) -> Result<String> {
    serde_json::to_string(schedule)
        .map_err(|e| ThermologError::database(format!("Failed to encode schedule: {e}")))
}
