//! Single-use device sessions
//!
//! A session connects, performs one read or command, and closes the connection
//! before anything else happens with the result. The device's client slot is
//! therefore free again by the time decoding or persistence runs, whatever their
//! outcome.

use super::{decode, DeviceClient, DeviceConnector, ThermostatSnapshot};
use crate::error::{Result, ThermologError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Commands accepted by the interactive surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCommand {
    Status,
    Away(bool),
    Keylock(bool),
    Temperature(f64),
    Hold { value: f64, hours: u32 },
}

/// Opens, uses and releases device connections
#[derive(Clone)]
pub struct DeviceSession {
    connector: Arc<dyn DeviceConnector>,
    credential: String,
    timeout: Duration,
}

impl DeviceSession {
    pub fn new(connector: Arc<dyn DeviceConnector>, credential: String, timeout: Duration) -> Self {
        Self {
            connector,
            credential,
            timeout,
        }
    }

    async fn open(&self, host: &str) -> Result<Box<dyn DeviceClient>> {
        match tokio::time::timeout(self.timeout, self.connector.connect(host, &self.credential))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ThermologError::timeout(format!("connecting to {host}"))),
        }
    }

    async fn release(host: &str, client: &mut Box<dyn DeviceClient>) {
        if let Err(e) = client.close().await {
            warn!(thermostat = host, "failed to close device session: {}", e);
        }
    }

    /// Read one snapshot from `host`.
    ///
    /// The connection is closed before the frame is decoded.
    pub async fn fetch(&self, host: &str) -> Result<ThermostatSnapshot> {
        let mut client = self.open(host).await?;
        let read = tokio::time::timeout(self.timeout, client.read_status()).await;
        Self::release(host, &mut client).await;

        let frame = match read {
            Ok(frame) => frame?,
            Err(_) => {
                return Err(ThermologError::timeout(format!(
                    "reading status from {host}"
                )))
            }
        };
        debug!(thermostat = host, "status frame read");
        decode(&frame)
    }

    /// Run one interactive command against `host` and render its result
    pub async fn execute(&self, host: &str, command: DeviceCommand) -> Result<serde_json::Value> {
        let mut client = self.open(host).await?;
        let outcome =
            tokio::time::timeout(self.timeout, Self::apply(client.as_mut(), command)).await;
        Self::release(host, &mut client).await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ThermologError::timeout(format!("command on {host}"))),
        }
    }

    /// Run `command` on each host in turn.
    ///
    /// The result is an object keyed by host; failures are rendered as
    /// `{"error": "..."}` in place of the result.
    pub async fn execute_all(&self, hosts: &[String], command: DeviceCommand) -> serde_json::Value {
        let mut results = serde_json::Map::new();
        for host in hosts {
            let value = match self.execute(host, command).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(thermostat = host.as_str(), "{:?} failed: {}", command, e);
                    serde_json::json!({ "error": e.to_string() })
                }
            };
            results.insert(host.clone(), value);
        }
        serde_json::Value::Object(results)
    }

    async fn apply(
        client: &mut dyn DeviceClient,
        command: DeviceCommand,
    ) -> Result<serde_json::Value> {
        fn ok() -> serde_json::Value {
            serde_json::json!({ "result": "ok" })
        }

        match command {
            DeviceCommand::Status => to_json(&client.get_status().await?),
            DeviceCommand::Away(away) => client.set_away(away).await.map(|_| ok()),
            DeviceCommand::Keylock(locked) => client.set_keylock(locked).await.map(|_| ok()),
            DeviceCommand::Temperature(value) => client.set_temperature(value).await.map(|_| ok()),
            DeviceCommand::Hold { value, hours } => {
                client.set_hold(value, hours).await.map(|_| ok())
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}
