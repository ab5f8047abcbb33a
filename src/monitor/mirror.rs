//! Mirrors each thermostat's configuration into the store
//!
//! Runs every cycle. All writes are upserts keyed by thermostat, so repeating them
//! leaves the store unchanged.

use crate::device::ThermostatSnapshot;
use crate::error::Result;
use crate::store::{PersistenceStore, SettingsRecord};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct ConfigMirror {
    store: Arc<dyn PersistenceStore>,
}

impl ConfigMirror {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }

    /// Upsert settings, and whichever schedules the device carries
    pub async fn mirror(&self, thermostat: &str, snapshot: &ThermostatSnapshot) -> Result<()> {
        self.store
            .upsert_settings(thermostat, &SettingsRecord::from_snapshot(snapshot))
            .await?;

        if !snapshot.comfort.is_empty() {
            self.store
                .upsert_comfort_schedule(thermostat, &snapshot.comfort)
                .await?;
        }
        if snapshot.hotwater.is_some() || !snapshot.timer.is_empty() {
            self.store
                .upsert_timer_schedule(thermostat, &snapshot.timer)
                .await?;
        }

        debug!(thermostat, "configuration mirrored");
        Ok(())
    }
}
