//! Raw status frames and their decoding into snapshots
//!
//! A `StatusFrame` is what a device session hands back before any validation:
//! times are still strings and enumerations are still labels. `decode` is the only
//! way a frame becomes a `ThermostatSnapshot`.

use super::snapshot::{
    AwayMode, ComfortLevel, ComfortSchedule, DeviceConfig, FrostProtect, HeatingBlock, Holiday,
    HotwaterBlock, ProductId, RunMode, Temperatures, TemperatureUnits, ThermostatSnapshot,
    TimerSchedule, TimerSlot, DEVICE_TIME_FORMAT,
};
use crate::error::{Result, ThermologError};
use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RawHoliday {
    pub enabled: bool,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawConfig {
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default)]
    pub program_mode: String,
    #[serde(default)]
    pub optimum_start: f64,
}

fn default_units() -> String {
    "C".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawComfortLevel {
    pub time: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTimerSlot {
    pub on: String,
    pub off: String,
}

/// Undecoded status as read from a device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusFrame {
    pub time: String,
    pub enabled: bool,
    #[serde(default = "default_run_mode")]
    pub run_mode: String,
    #[serde(default)]
    pub heating: Option<HeatingBlock>,
    #[serde(default)]
    pub hotwater: Option<HotwaterBlock>,
    #[serde(default)]
    pub away: bool,
    #[serde(default)]
    pub holiday: RawHoliday,
    #[serde(default)]
    pub frost_protect: FrostProtect,
    pub config: RawConfig,
    #[serde(default)]
    pub comfort: Vec<Vec<RawComfortLevel>>,
    #[serde(default)]
    pub timer: Vec<Vec<RawTimerSlot>>,
    #[serde(default)]
    pub temperatures: Temperatures,
    #[serde(default)]
    pub product: ProductId,
}

fn default_run_mode() -> String {
    "normal".to_string()
}

fn parse_clock(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| ThermologError::decode(format!("invalid clock time '{value}': {e}")))
}

fn parse_device_time(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DEVICE_TIME_FORMAT)
        .map_err(|e| ThermologError::decode(format!("invalid device time '{value}': {e}")))
}

fn week<R, T, F>(raw: &[Vec<R>], what: &str, mut convert: F) -> Result<[Vec<T>; 7]>
where
    F: FnMut(&R) -> Result<T>,
{
    if raw.len() > 7 {
        return Err(ThermologError::decode(format!(
            "{what} schedule has {} days",
            raw.len()
        )));
    }

    let mut days: [Vec<T>; 7] = Default::default();
    for (day, entries) in raw.iter().enumerate() {
        days[day] = entries.iter().map(&mut convert).collect::<Result<Vec<_>>>()?;
    }
    Ok(days)
}

/// Turn a raw frame into a validated snapshot
pub fn decode(frame: &StatusFrame) -> Result<ThermostatSnapshot> {
    let run_mode = match frame.run_mode.to_ascii_lowercase().as_str() {
        "normal" => RunMode::Normal,
        "frost" => RunMode::Frost,
        other => {
            return Err(ThermologError::decode(format!("unknown run mode '{other}'")));
        }
    };

    let units = match frame.config.units.to_ascii_uppercase().as_str() {
        "C" => TemperatureUnits::Celsius,
        "F" => TemperatureUnits::Fahrenheit,
        other => return Err(ThermologError::decode(format!("unknown units '{other}'"))),
    };

    let comfort = week(&frame.comfort, "comfort", |level: &RawComfortLevel| {
        Ok(ComfortLevel {
            time: parse_clock(&level.time)?,
            temperature: level.temperature,
        })
    })?;

    let timer = week(&frame.timer, "timer", |slot: &RawTimerSlot| {
        Ok(TimerSlot {
            on: parse_clock(&slot.on)?,
            off: parse_clock(&slot.off)?,
        })
    })?;

    let holiday_time = match frame.holiday.time.as_deref() {
        Some(value) if !value.is_empty() => Some(parse_device_time(value)?),
        _ => None,
    };

    Ok(ThermostatSnapshot {
        time: parse_device_time(&frame.time)?,
        enabled: frame.enabled,
        run_mode,
        heating: frame.heating,
        hotwater: frame.hotwater,
        away: if frame.away {
            AwayMode::Away
        } else {
            AwayMode::Home
        },
        holiday: Holiday {
            enabled: frame.holiday.enabled,
            time: holiday_time,
        },
        frost_protect: frame.frost_protect,
        config: DeviceConfig {
            units,
            program_mode: frame.config.program_mode.clone(),
            optimum_start_hours: frame.config.optimum_start,
        },
        comfort: ComfortSchedule { days: comfort },
        timer: TimerSchedule { days: timer },
        temperatures: frame.temperatures,
        product: frame.product.clone(),
    })
}
