//! Thermostat access: snapshot model, client traits and adapters
//!
//! Each thermostat exposes a single client slot, so every interaction opens a
//! connection, does one thing and closes it again. `DeviceConnector` opens the
//! connection, `DeviceClient` is the open session.

pub mod frame;
pub mod http_client;
pub mod schedule;
pub mod session;
pub mod snapshot;

use crate::error::Result;
use async_trait::async_trait;

pub use frame::{decode, StatusFrame};
pub use http_client::{HttpDeviceClient, HttpDeviceConnector};
pub use schedule::{derive_comfort, derive_timer, ComfortState};
pub use session::DeviceSession;
pub use snapshot::ThermostatSnapshot;

/// Opens sessions to thermostats
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Connect to the thermostat at `host`, authenticating with `credential`
    async fn connect(&self, host: &str, credential: &str) -> Result<Box<dyn DeviceClient>>;
}

/// An open session holding the device's only client slot
#[async_trait]
pub trait DeviceClient: Send {
    /// Read the raw status frame
    async fn read_status(&mut self) -> Result<StatusFrame>;

    /// Release the client slot
    async fn close(&mut self) -> Result<()>;

    /// Set or clear away mode
    async fn set_away(&mut self, away: bool) -> Result<()>;

    /// Lock or unlock the keypad
    async fn set_keylock(&mut self, locked: bool) -> Result<()>;

    /// Set the target temperature until the next comfort level
    async fn set_temperature(&mut self, value: f64) -> Result<()>;

    /// Hold a target temperature for a number of hours
    async fn set_hold(&mut self, value: f64, hours: u32) -> Result<()>;

    /// Read and decode the current status
    async fn get_status(&mut self) -> Result<ThermostatSnapshot> {
        let frame = self.read_status().await?;
        decode(&frame)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::snapshot::*;
    use chrono::NaiveDateTime;

    /// Enabled heating-only thermostat in normal mode at `time`
    pub(crate) fn snapshot_at(time: &str) -> ThermostatSnapshot {
        ThermostatSnapshot {
            time: NaiveDateTime::parse_from_str(time, DEVICE_TIME_FORMAT).unwrap(),
            enabled: true,
            run_mode: RunMode::Normal,
            heating: Some(HeatingBlock {
                on: false,
                target: 20.0,
                hold: false,
            }),
            hotwater: None,
            away: AwayMode::Home,
            holiday: Holiday::default(),
            frost_protect: FrostProtect {
                enabled: true,
                target: 7.0,
            },
            config: DeviceConfig {
                optimum_start_hours: 2.0,
                ..DeviceConfig::default()
            },
            comfort: ComfortSchedule::default(),
            timer: TimerSchedule::default(),
            temperatures: Temperatures {
                remote: None,
                internal: Some(19.0),
                floor: None,
            },
            product: ProductId {
                model: "PRT".to_string(),
                firmware: None,
            },
        }
    }
}
