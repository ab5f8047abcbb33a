//! The poll loop
//!
//! One `Monitor` owns every piece of mutable state the daemon has: the change
//! tracker, the weather throttle and the store handle. Thermostats are polled one
//! after another; each step that touches a device or the store is isolated so a
//! failure costs at most that step for that thermostat.

pub mod isolation;
pub mod mirror;
pub mod scheduler;
pub mod weather;

use crate::config::Settings;
use crate::device::{
    derive_comfort, derive_timer, DeviceSession, HttpDeviceConnector, ThermostatSnapshot,
};
use crate::engine::{action_heat, action_hotwater, ChangeTracker};
use crate::error::Result;
use crate::store::{open_store, LogSample, PersistenceStore};
use crate::weather::OpenWeatherClient;
use chrono::{Local, NaiveTime, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use isolation::isolate;
pub use mirror::ConfigMirror;
pub use scheduler::{compute_sleep, parse_time_of_day};
pub use weather::{WeatherThrottle, WeatherTick};

/// Summary of one poll cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub polled: usize,
    pub failed: usize,
    pub events: usize,
    /// Clock of the last thermostat that answered
    pub last_clock: Option<NaiveTime>,
    pub weather: Option<WeatherTick>,
}

pub struct Monitor {
    hosts: Vec<String>,
    poll_interval: u64,
    session: DeviceSession,
    store: Arc<dyn PersistenceStore>,
    mirror: ConfigMirror,
    tracker: ChangeTracker,
    weather: Option<WeatherThrottle>,
}

impl Monitor {
    pub fn new(
        hosts: Vec<String>,
        poll_interval: u64,
        session: DeviceSession,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        Self {
            hosts,
            poll_interval,
            session,
            mirror: ConfigMirror::new(store.clone()),
            store,
            tracker: ChangeTracker::new(),
            weather: None,
        }
    }

    pub fn with_weather(mut self, throttle: WeatherThrottle) -> Self {
        self.weather = Some(throttle);
        self
    }

    /// Wire up the HTTP device connector, the configured store and, if enabled,
    /// the weather service
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let connector = HttpDeviceConnector::new(settings.device.device_timeout)?;
        let session = DeviceSession::new(
            Arc::new(connector),
            settings.device.credential.clone(),
            settings.device.device_timeout,
        );
        let store = open_store(
            &settings.persistence_source,
            settings.persistence_user.as_deref(),
            settings.persistence_credential.as_deref(),
        )
        .await?;

        let mut monitor = Self::new(
            settings.device.hosts.clone(),
            settings.poll_interval,
            session,
            store,
        );

        if settings.weather_enabled() {
            let client = OpenWeatherClient::new(
                &settings.weather_service,
                settings.weather_key.as_deref().unwrap_or_default(),
                settings.weather_location.as_deref().unwrap_or_default(),
                &settings.weather_units,
                settings.device.device_timeout,
            )?;
            monitor = monitor.with_weather(WeatherThrottle::new(
                Arc::new(client),
                settings.weather_log_rate,
            ));
        } else {
            info!("Weather logging disabled");
        }

        Ok(monitor)
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Load the weather dedup baseline from the store
    pub async fn seed_weather(&mut self) {
        if let Some(throttle) = self.weather.as_mut() {
            throttle.seed(self.store.as_ref()).await;
        }
    }

    /// Poll every thermostat once, then give the weather throttle its tick
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        for index in 0..self.hosts.len() {
            let host = self.hosts[index].clone();
            match isolate(&host, "poll", self.poll_thermostat(&host)).await {
                Some((snapshot, events)) => {
                    report.polled += 1;
                    report.events += events;
                    report.last_clock = Some(snapshot.time.time());
                }
                None => report.failed += 1,
            }
        }

        if let Some(throttle) = self.weather.as_mut() {
            report.weather = Some(throttle.tick(self.store.as_ref()).await);
        }
        report
    }

    /// Fetch, derive and record one thermostat.
    ///
    /// Only the fetch can fail the whole step; store writes are isolated
    /// individually.
    async fn poll_thermostat(&mut self, host: &str) -> Result<(ThermostatSnapshot, usize)> {
        let snapshot = self.session.fetch(host).await?;

        let comfort = derive_comfort(&snapshot);
        let timer_on = derive_timer(&snapshot);
        let heat = action_heat(&snapshot, comfort.as_ref());
        let hotwater = action_hotwater(&snapshot, timer_on);

        isolate(host, "settings mirror", self.mirror.mirror(host, &snapshot)).await;

        let sample = LogSample {
            thermostat: host.to_string(),
            time: snapshot.time,
            air: snapshot.temperatures.air(),
            target: heat.0,
            comfort: comfort.map(|c| c.comfort),
        };
        debug!(
            thermostat = host,
            "{} air {:?} target {} ({})",
            snapshot.time_string(),
            sample.air,
            sample.target,
            heat.1
        );
        isolate(host, "log sample", self.store.insert_log_sample(&sample)).await;

        let events = self.tracker.observe(host, &snapshot, heat, hotwater);
        for event in &events {
            info!(
                thermostat = host,
                "{} {} {}",
                event.class().as_str(),
                event.state(),
                event
                    .temperature()
                    .map(|t| t.to_string())
                    .unwrap_or_default()
            );
            isolate(host, "event insert", self.store.insert_event(event)).await;
        }

        Ok((snapshot, events.len()))
    }

    /// Seconds until the next cycle should start
    pub fn next_sleep(&self, report: &CycleReport) -> u64 {
        let clock = report.last_clock.unwrap_or_else(|| {
            let now = Local::now().time();
            now.with_nanosecond(0).unwrap_or(now)
        });
        compute_sleep(self.poll_interval, clock)
    }

    /// Cycle until `stop` is cancelled.
    ///
    /// The token is checked before each cycle. A cycle that has started always
    /// finishes; only the sleep between cycles is cut short.
    pub async fn run(&mut self, stop: CancellationToken) {
        while !stop.is_cancelled() {
            let report = self.run_cycle().await;
            let sleep = self.next_sleep(&report);
            debug!(
                "cycle done: {} polled, {} failed, {} events; sleeping {}s",
                report.polled, report.failed, report.events, sleep
            );

            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(sleep)) => {}
            }
        }
    }
}
