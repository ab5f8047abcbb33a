//! Thermostat status snapshot
//!
//! One `ThermostatSnapshot` is produced per device read. The optional `heating` and
//! `hotwater` blocks describe device capability: a thermostat without a hot-water
//! relay simply has no `hotwater` block.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Wall-clock format used by thermostats for their local time
pub const DEVICE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Device run mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Normal,
    Frost,
}

/// Occupancy mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AwayMode {
    #[default]
    Home,
    Away,
}

/// Space heating block, present when the device drives a heating circuit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HeatingBlock {
    /// Heating relay currently demanding heat
    pub on: bool,
    /// Active target temperature
    pub target: f64,
    /// Temporary hold in effect
    pub hold: bool,
}

/// Hot-water block, present when the device drives a hot-water circuit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HotwaterBlock {
    pub on: bool,
    pub boost: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Holiday {
    pub enabled: bool,
    /// Return time when a holiday is programmed
    pub time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct FrostProtect {
    pub enabled: bool,
    pub target: f64,
}

/// Temperature units reported by the device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TemperatureUnits {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl TemperatureUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }
}

/// Device-side configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub units: TemperatureUnits,
    /// Program mode label as reported by the device (e.g. "7day", "5/2day")
    pub program_mode: String,
    /// Hours ahead of a comfort change at which optimum start may begin heating
    pub optimum_start_hours: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            units: TemperatureUnits::Celsius,
            program_mode: "7day".to_string(),
            optimum_start_hours: 0.0,
        }
    }
}

/// One comfort level: from `time` onwards the target is `temperature`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ComfortLevel {
    pub time: NaiveTime,
    pub temperature: f64,
}

/// Weekly comfort schedule, Monday first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ComfortSchedule {
    pub days: [Vec<ComfortLevel>; 7],
}

impl ComfortSchedule {
    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Vec::is_empty)
    }
}

/// Hot-water timer slot, on in `[on, off)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimerSlot {
    pub on: NaiveTime,
    pub off: NaiveTime,
}

/// Weekly hot-water timer schedule, Monday first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TimerSchedule {
    pub days: [Vec<TimerSlot>; 7],
}

impl TimerSchedule {
    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Vec::is_empty)
    }
}

/// Temperature sensors, any of which may be absent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Temperatures {
    pub remote: Option<f64>,
    pub internal: Option<f64>,
    pub floor: Option<f64>,
}

impl Temperatures {
    /// Air temperature: remote sensor, else internal, else floor.
    ///
    /// Presence decides the fallback, so a genuine 0.0 reading is kept.
    pub fn air(&self) -> Option<f64> {
        self.remote.or(self.internal).or(self.floor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProductId {
    pub model: String,
    pub firmware: Option<String>,
}

/// Decoded status of one thermostat at one instant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThermostatSnapshot {
    /// Device's own wall-clock time
    pub time: NaiveDateTime,
    pub enabled: bool,
    pub run_mode: RunMode,
    pub heating: Option<HeatingBlock>,
    pub hotwater: Option<HotwaterBlock>,
    pub away: AwayMode,
    pub holiday: Holiday,
    pub frost_protect: FrostProtect,
    pub config: DeviceConfig,
    pub comfort: ComfortSchedule,
    pub timer: TimerSchedule,
    pub temperatures: Temperatures,
    pub product: ProductId,
}

impl ThermostatSnapshot {
    /// Device clock formatted the way it is logged and stored
    pub fn time_string(&self) -> String {
        self.time.format(DEVICE_TIME_FORMAT).to_string()
    }
}
