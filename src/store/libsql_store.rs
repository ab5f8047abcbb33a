//! libsql-backed store
//!
//! Works against a local SQLite file or a remote Turso database. Tables are
//! created on open if missing.

use super::{
    schedule_json, LogSample, PersistenceStore, SettingsRecord, WeatherObservation,
};
use crate::device::snapshot::{ComfortSchedule, TimerSchedule, DEVICE_TIME_FORMAT};
use crate::engine::Event;
use crate::error::{Result, ThermologError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params::Params, Connection, Database, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        thermostat TEXT PRIMARY KEY,
        model TEXT NOT NULL,
        firmware TEXT,
        units TEXT NOT NULL,
        program_mode TEXT NOT NULL,
        optimum_start_hours REAL NOT NULL,
        frost_enabled INTEGER NOT NULL,
        frost_target REAL NOT NULL,
        has_heating INTEGER NOT NULL,
        has_hotwater INTEGER NOT NULL,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comfort_schedule (
        thermostat TEXT PRIMARY KEY,
        schedule TEXT NOT NULL,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timer_schedule (
        thermostat TEXT PRIMARY KEY,
        schedule TEXT NOT NULL,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS log_samples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        thermostat TEXT NOT NULL,
        time TEXT NOT NULL,
        air REAL,
        target REAL NOT NULL,
        comfort REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        thermostat TEXT NOT NULL,
        time TEXT NOT NULL,
        class TEXT NOT NULL,
        state TEXT NOT NULL,
        cause TEXT,
        temperature REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weather (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        observed_at INTEGER NOT NULL,
        time TEXT NOT NULL,
        external REAL NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_log_samples_thermostat_time ON log_samples(thermostat, time)",
    "CREATE INDEX IF NOT EXISTS idx_events_thermostat_time ON events(thermostat, time)",
    "CREATE INDEX IF NOT EXISTS idx_weather_observed_at ON weather(observed_at DESC)",
];

fn real_or_null(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

fn text_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::Text(v.to_string()))
}

/// Store backed by libsql
pub struct LibsqlStore {
    _database: Arc<Database>,
    connection: Arc<RwLock<Connection>>,
}

impl LibsqlStore {
    /// Open `source`, a local path or `libsql://` URL.
    ///
    /// Remote databases authenticate with `credential` as the auth token. `user`
    /// only labels the connection in the log.
    pub async fn open(source: &str, user: Option<&str>, credential: Option<&str>) -> Result<Self> {
        info!(
            "Opening libsql store at {} as {}",
            source,
            user.unwrap_or("default user")
        );

        let database = if source.starts_with("libsql://") || source.starts_with("https://") {
            let token = credential.filter(|t| !t.is_empty()).ok_or_else(|| {
                ThermologError::config("Auth token required for remote libsql database")
            })?;
            libsql::Builder::new_remote(source.to_string(), token.to_string())
                .build()
                .await
                .map_err(|e| ThermologError::database(format!("Failed to connect: {e}")))?
        } else {
            let path = source.strip_prefix("file:").unwrap_or(source);
            libsql::Builder::new_local(path)
                .build()
                .await
                .map_err(|e| {
                    ThermologError::database(format!("Failed to open local database: {e}"))
                })?
        };

        let connection = database
            .connect()
            .map_err(|e| ThermologError::database(format!("Failed to create connection: {e}")))?;

        let store = Self {
            _database: Arc::new(database),
            connection: Arc::new(RwLock::new(connection)),
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        debug!("Initializing database schema");
        let conn = self.connection.write().await;
        for statement in SCHEMA {
            conn.execute(statement, ()).await.map_err(|e| {
                ThermologError::database(format!("Failed to initialize schema: {e}"))
            })?;
        }
        Ok(())
    }

    async fn upsert_schedule(&self, table: &str, thermostat: &str, schedule: String) -> Result<()> {
        let conn = self.connection.write().await;
        let sql = format!(
            "INSERT INTO {table} (thermostat, schedule) VALUES (?1, ?2)
             ON CONFLICT(thermostat) DO UPDATE SET
                schedule = ?2,
                updated_at = CURRENT_TIMESTAMP"
        );
        conn.execute(&sql, (thermostat, schedule))
            .await
            .map_err(|e| ThermologError::database(format!("Failed to store {table}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceStore for LibsqlStore {
    async fn upsert_settings(&self, thermostat: &str, settings: &SettingsRecord) -> Result<()> {
        let conn = self.connection.write().await;

        let upsert_sql = r#"
            INSERT INTO settings (thermostat, model, firmware, units, program_mode,
                optimum_start_hours, frost_enabled, frost_target, has_heating, has_hotwater)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(thermostat) DO UPDATE SET
                model = ?2,
                firmware = ?3,
                units = ?4,
                program_mode = ?5,
                optimum_start_hours = ?6,
                frost_enabled = ?7,
                frost_target = ?8,
                has_heating = ?9,
                has_hotwater = ?10,
                updated_at = CURRENT_TIMESTAMP
        "#;

        conn.execute(
            upsert_sql,
            Params::Positional(vec![
                Value::Text(thermostat.to_string()),
                Value::Text(settings.model.clone()),
                text_or_null(settings.firmware.as_deref()),
                Value::Text(settings.units.clone()),
                Value::Text(settings.program_mode.clone()),
                Value::Real(settings.optimum_start_hours),
                Value::Integer(settings.frost_enabled as i64),
                Value::Real(settings.frost_target),
                Value::Integer(settings.has_heating as i64),
                Value::Integer(settings.has_hotwater as i64),
            ]),
        )
        .await
        .map_err(|e| ThermologError::database(format!("Failed to store settings: {e}")))?;
        Ok(())
    }

    async fn upsert_comfort_schedule(
        &self,
        thermostat: &str,
        schedule: &ComfortSchedule,
    ) -> Result<()> {
        self.upsert_schedule("comfort_schedule", thermostat, schedule_json(schedule)?)
            .await
    }

    async fn upsert_timer_schedule(
        &self,
        thermostat: &str,
        schedule: &TimerSchedule,
    ) -> Result<()> {
        self.upsert_schedule("timer_schedule", thermostat, schedule_json(schedule)?)
            .await
    }

    async fn insert_log_sample(&self, sample: &LogSample) -> Result<()> {
        let conn = self.connection.write().await;
        conn.execute(
            "INSERT INTO log_samples (thermostat, time, air, target, comfort) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            Params::Positional(vec![
                Value::Text(sample.thermostat.clone()),
                Value::Text(sample.time.format(DEVICE_TIME_FORMAT).to_string()),
                real_or_null(sample.air),
                Value::Real(sample.target),
                real_or_null(sample.comfort),
            ]),
        )
        .await
        .map_err(|e| ThermologError::database(format!("Failed to store log sample: {e}")))?;
        Ok(())
    }

    async fn insert_event(&self, event: &Event) -> Result<()> {
        let conn = self.connection.write().await;
        conn.execute(
            "INSERT INTO events (thermostat, time, class, state, cause, temperature) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            Params::Positional(vec![
                Value::Text(event.thermostat.clone()),
                Value::Text(event.time.format(DEVICE_TIME_FORMAT).to_string()),
                Value::Text(event.class().as_str().to_string()),
                Value::Text(event.state().to_string()),
                text_or_null(event.cause()),
                real_or_null(event.temperature()),
            ]),
        )
        .await
        .map_err(|e| ThermologError::database(format!("Failed to store event: {e}")))?;
        Ok(())
    }

    async fn insert_weather_observation(&self, observation: &WeatherObservation) -> Result<()> {
        let conn = self.connection.write().await;
        conn.execute(
            "INSERT INTO weather (observed_at, time, external) VALUES (?1, ?2, ?3)",
            (
                observation.time.timestamp(),
                observation.time.to_rfc3339(),
                observation.external,
            ),
        )
        .await
        .map_err(|e| ThermologError::database(format!("Failed to store weather: {e}")))?;
        Ok(())
    }

    async fn latest_weather_observation(&self) -> Result<Option<WeatherObservation>> {
        let conn = self.connection.read().await;
        let mut rows = conn
            .query(
                "SELECT observed_at, external FROM weather ORDER BY observed_at DESC LIMIT 1",
                (),
            )
            .await
            .map_err(|e| ThermologError::database(format!("Failed to execute query: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| ThermologError::database(format!("Failed to fetch row: {e}")))?
        else {
            return Ok(None);
        };

        let observed_at: i64 = row
            .get(0)
            .map_err(|e| ThermologError::database(format!("Failed to get observed_at: {e}")))?;
        let external: f64 = row
            .get(1)
            .map_err(|e| ThermologError::database(format!("Failed to get external: {e}")))?;

        match DateTime::<Utc>::from_timestamp(observed_at, 0) {
            Some(time) => Ok(Some(WeatherObservation { time, external })),
            None => {
                warn!("Ignoring weather row with invalid timestamp {}", observed_at);
                Ok(None)
            }
        }
    }
}
