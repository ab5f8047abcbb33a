//! Common test utilities
//!
//! Scripted device and weather fakes plus a store that can be told to fail, for
//! driving the monitor through whole cycles without any network.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thermolog::device::snapshot::{ComfortSchedule, TimerSchedule};
use thermolog::device::{DeviceClient, DeviceConnector, DeviceSession, StatusFrame};
use thermolog::engine::Event;
use thermolog::store::{
    LogSample, MemoryStore, PersistenceStore, SettingsRecord, WeatherObservation,
};
use thermolog::weather::{WeatherClient, WeatherReading};
use thermolog::{Result, ThermologError};

/// Status frame for a heating-only thermostat
pub fn heating_frame(time: &str, on: bool, target: f64) -> StatusFrame {
    serde_json::from_value(json!({
        "time": time,
        "enabled": true,
        "heating": { "on": on, "target": target, "hold": false },
        "frost_protect": { "enabled": true, "target": 7.0 },
        "config": { "units": "C", "program_mode": "7day", "optimum_start": 2.0 },
        "comfort": [
            [{ "time": "06:30", "temperature": 21.0 }, { "time": "22:00", "temperature": 16.0 }],
            [{ "time": "06:30", "temperature": 21.0 }, { "time": "22:00", "temperature": 16.0 }]
        ],
        "temperatures": { "internal": 19.5 },
        "product": { "model": "PRT", "firmware": "1.2" }
    }))
    .expect("valid frame")
}

/// Status frame for a combined heating and hot-water thermostat
pub fn combi_frame(time: &str, hotwater_on: bool) -> StatusFrame {
    let mut frame = heating_frame(time, false, 21.0);
    frame.hotwater = serde_json::from_value(json!({ "on": hotwater_on, "boost": false }))
        .expect("valid hotwater block");
    frame
}

/// One scripted device reply
#[derive(Debug, Clone)]
pub enum Reply {
    Frame(StatusFrame),
    Fail(String),
    Panic,
}

/// Device connector replaying per-host scripts; the last reply repeats
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    pub connects: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, host: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(host.to_string(), replies.into());
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn next_reply(&self, host: &str) -> Option<Reply> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(host)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl DeviceConnector for ScriptedConnector {
    async fn connect(&self, host: &str, _credential: &str) -> Result<Box<dyn DeviceClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .next_reply(host)
            .ok_or_else(|| ThermologError::device(format!("{host}: no route to host")))?;
        Ok(Box::new(ScriptedClient {
            reply: Some(reply),
            closes: self.closes.clone(),
        }))
    }
}

struct ScriptedClient {
    reply: Option<Reply>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl DeviceClient for ScriptedClient {
    async fn read_status(&mut self) -> Result<StatusFrame> {
        match self.reply.take() {
            Some(Reply::Frame(frame)) => Ok(frame),
            Some(Reply::Fail(message)) => Err(ThermologError::device(message)),
            Some(Reply::Panic) => panic!("scripted device panic"),
            None => Err(ThermologError::device("status already read")),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_away(&mut self, _away: bool) -> Result<()> {
        Ok(())
    }

    async fn set_keylock(&mut self, _locked: bool) -> Result<()> {
        Ok(())
    }

    async fn set_temperature(&mut self, _value: f64) -> Result<()> {
        Ok(())
    }

    async fn set_hold(&mut self, _value: f64, _hours: u32) -> Result<()> {
        Ok(())
    }
}

pub fn session_for(connector: Arc<ScriptedConnector>) -> DeviceSession {
    DeviceSession::new(connector, "secret".to_string(), Duration::from_secs(5))
}

/// Weather client replaying readings; `None` entries fail
#[derive(Default)]
pub struct ScriptedWeather {
    readings: Mutex<VecDeque<Option<WeatherReading>>>,
    pub calls: AtomicUsize,
}

impl ScriptedWeather {
    pub fn new(readings: Vec<Option<WeatherReading>>) -> Arc<Self> {
        Arc::new(Self {
            readings: Mutex::new(readings.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WeatherClient for ScriptedWeather {
    async fn current_temperature(&self) -> Result<WeatherReading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.readings
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .ok_or_else(|| ThermologError::weather("service unavailable"))
    }
}

/// Memory store whose writes fail for one thermostat
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing: String,
}

impl FlakyStore {
    pub fn failing_for(thermostat: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: thermostat.to_string(),
        }
    }

    fn check(&self, thermostat: &str) -> Result<()> {
        if thermostat == self.failing {
            Err(ThermologError::database("database is locked"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistenceStore for FlakyStore {
    async fn upsert_settings(&self, thermostat: &str, settings: &SettingsRecord) -> Result<()> {
        self.check(thermostat)?;
        self.inner.upsert_settings(thermostat, settings).await
    }

    async fn upsert_comfort_schedule(
        &self,
        thermostat: &str,
        schedule: &ComfortSchedule,
    ) -> Result<()> {
        self.check(thermostat)?;
        self.inner.upsert_comfort_schedule(thermostat, schedule).await
    }

    async fn upsert_timer_schedule(
        &self,
        thermostat: &str,
        schedule: &TimerSchedule,
    ) -> Result<()> {
        self.check(thermostat)?;
        self.inner.upsert_timer_schedule(thermostat, schedule).await
    }

    async fn insert_log_sample(&self, sample: &LogSample) -> Result<()> {
        self.check(&sample.thermostat)?;
        self.inner.insert_log_sample(sample).await
    }

    async fn insert_event(&self, event: &Event) -> Result<()> {
        self.check(&event.thermostat)?;
        self.inner.insert_event(event).await
    }

    async fn insert_weather_observation(&self, observation: &WeatherObservation) -> Result<()> {
        self.inner.insert_weather_observation(observation).await
    }

    async fn latest_weather_observation(&self) -> Result<Option<WeatherObservation>> {
        self.inner.latest_weather_observation().await
    }
}
