//! Thermostat fleet monitoring daemon
//!
//! Polls a set of thermostats on a wall-clock aligned grid, works out why each one
//! is heating (or not), and records only the changes. The outside temperature is
//! logged alongside on a slower cadence.
//!
//! # Layout
//!
//! - [`device`]: snapshot model, device traits and the HTTP gateway adapter
//! - [`engine`]: cause derivation and edge-triggered change tracking
//! - [`monitor`]: the poll loop with its scheduler, weather throttle and fault isolation
//! - [`store`]: persistence (in-memory or libsql)
//! - [`lifecycle`]: instance lock, daemonization and stop signals

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod monitor;
pub mod store;
pub mod weather;

pub use config::{DaemonArgs, DeviceArgs, DeviceSettings, Settings};
pub use error::{Result, ThermologError};
pub use monitor::Monitor;
