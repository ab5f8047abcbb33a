//! Configuration resolution
//!
//! Every setting can come from a command-line flag (or its `THERMOLOG_*`
//! environment variable), from a TOML file, or from a built-in default, in that
//! order of precedence. Resolution happens once at startup and produces an
//! immutable `Settings` that the rest of the daemon borrows.

use crate::error::{Result, ThermologError};
use clap::{Args, Parser};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/thermolog.toml";
pub const DEFAULT_POLL_INTERVAL: u64 = 60;
pub const DEFAULT_WEATHER_LOG_RATE: u32 = 10;
pub const DEFAULT_WEATHER_SERVICE: &str = "https://api.openweathermap.org";
pub const DEFAULT_WEATHER_UNITS: &str = "metric";
pub const DEFAULT_PERSISTENCE_SOURCE: &str = "memory";
pub const DEFAULT_LOCK_FILE: &str = "/tmp/thermolog.lock";
pub const DEFAULT_LOG_DESTINATION: &str = "/var/log/thermolog.log";
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(10);

const REDACTED: &str = "***";

/// Options shared by the daemon and the interactive client
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// TOML configuration file (defaults to /etc/thermolog.toml when present)
    #[arg(short, long, env = "THERMOLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Thermostat host, repeat or comma-separate for several
    #[arg(long = "host", env = "THERMOLOG_HOSTS", value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// Shared device credential
    #[arg(long, env = "THERMOLOG_CREDENTIAL", hide_env_values = true)]
    pub credential: Option<String>,

    /// Deadline for one device connection or read, e.g. "10s"
    #[arg(
        long,
        env = "THERMOLOG_DEVICE_TIMEOUT",
        value_parser = humantime_serde::re::humantime::parse_duration
    )]
    pub device_timeout: Option<Duration>,
}

/// Thermostat monitoring daemon
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "thermolog-daemon")]
#[command(about = "Polls thermostats, derives heating causes and logs state changes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct DaemonArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Seconds between polls
    #[arg(long, env = "THERMOLOG_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Fetch the outside temperature every N cycles, 0 disables
    #[arg(long, env = "THERMOLOG_WEATHER_LOG_RATE")]
    pub weather_log_rate: Option<u32>,

    /// Base URL of the weather service
    #[arg(long, env = "THERMOLOG_WEATHER_SERVICE")]
    pub weather_service: Option<String>,

    /// Weather service API key
    #[arg(long, env = "THERMOLOG_WEATHER_KEY", hide_env_values = true)]
    pub weather_key: Option<String>,

    /// Weather location, e.g. "London,uk"
    #[arg(long, env = "THERMOLOG_WEATHER_LOCATION")]
    pub weather_location: Option<String>,

    /// Weather units (metric, imperial or standard)
    #[arg(long, env = "THERMOLOG_WEATHER_UNITS")]
    pub weather_units: Option<String>,

    /// "memory", a local database path or a libsql:// URL
    #[arg(long, env = "THERMOLOG_PERSISTENCE_SOURCE")]
    pub persistence_source: Option<String>,

    /// Database user
    #[arg(long, env = "THERMOLOG_PERSISTENCE_USER")]
    pub persistence_user: Option<String>,

    /// Database credential or auth token
    #[arg(long, env = "THERMOLOG_PERSISTENCE_CREDENTIAL", hide_env_values = true)]
    pub persistence_credential: Option<String>,

    /// Log file; stderr in the foreground, /var/log/thermolog.log when detached
    #[arg(long, env = "THERMOLOG_LOG_DESTINATION")]
    pub log_destination: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Instance lock file
    #[arg(long, env = "THERMOLOG_LOCK_FILE")]
    pub lock_file: Option<PathBuf>,

    /// Stay attached to the terminal
    #[arg(short, long)]
    pub foreground: bool,
}

/// Contents of the TOML configuration file; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub hosts: Option<Vec<String>>,
    pub credential: Option<String>,
    #[serde(with = "humantime_serde")]
    pub device_timeout: Option<Duration>,
    pub poll_interval: Option<u64>,
    pub weather_log_rate: Option<u32>,
    pub weather_service: Option<String>,
    pub weather_key: Option<String>,
    pub weather_location: Option<String>,
    pub weather_units: Option<String>,
    pub persistence_source: Option<String>,
    pub persistence_user: Option<String>,
    pub persistence_credential: Option<String>,
    pub log_destination: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub lock_file: Option<PathBuf>,
    pub foreground: Option<bool>,
}

impl ConfigFile {
    /// Parse a TOML document
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| ThermologError::config(format!("Invalid config file: {e}")))
    }

    /// Load `path`, or the default file if it exists.
    ///
    /// An explicitly named file must exist; a missing default file yields an
    /// empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|e| {
            ThermologError::config(format!("Cannot read config file {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }
}

/// Connection settings for thermostats
#[derive(Clone, Serialize, PartialEq)]
pub struct DeviceSettings {
    pub hosts: Vec<String>,
    pub credential: String,
    #[serde(with = "humantime_serde")]
    pub device_timeout: Duration,
}

impl fmt::Debug for DeviceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSettings")
            .field("hosts", &self.hosts)
            .field("credential", &REDACTED)
            .field("device_timeout", &self.device_timeout)
            .finish()
    }
}

impl DeviceSettings {
    /// Resolve device settings for the interactive client
    pub fn resolve(args: &DeviceArgs) -> Result<Self> {
        let file = ConfigFile::load(args.config.as_deref())?;
        let settings = Self::from_parts(args, &file);
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_parts(args: &DeviceArgs, file: &ConfigFile) -> Self {
        let hosts = if args.hosts.is_empty() {
            file.hosts.clone().unwrap_or_default()
        } else {
            args.hosts.clone()
        };

        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            credential: args
                .credential
                .clone()
                .or_else(|| file.credential.clone())
                .unwrap_or_default(),
            device_timeout: args
                .device_timeout
                .or(file.device_timeout)
                .unwrap_or(DEFAULT_DEVICE_TIMEOUT),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(ThermologError::config(
                "At least one thermostat host is required. \
                 Use --host or set hosts in the config file",
            ));
        }
        if self.device_timeout.is_zero() {
            return Err(ThermologError::config("device_timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Fully resolved daemon settings
#[derive(Clone, Serialize, PartialEq)]
pub struct Settings {
    #[serde(flatten)]
    pub device: DeviceSettings,
    pub poll_interval: u64,
    pub weather_log_rate: u32,
    pub weather_service: String,
    pub weather_key: Option<String>,
    pub weather_location: Option<String>,
    pub weather_units: String,
    pub persistence_source: String,
    pub persistence_user: Option<String>,
    pub persistence_credential: Option<String>,
    pub log_destination: Option<PathBuf>,
    pub verbose: bool,
    pub lock_file: PathBuf,
    pub foreground: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| REDACTED);
        f.debug_struct("Settings")
            .field("device", &self.device)
            .field("poll_interval", &self.poll_interval)
            .field("weather_log_rate", &self.weather_log_rate)
            .field("weather_service", &self.weather_service)
            .field("weather_key", &redact(&self.weather_key))
            .field("weather_location", &self.weather_location)
            .field("weather_units", &self.weather_units)
            .field("persistence_source", &self.persistence_source)
            .field("persistence_user", &self.persistence_user)
            .field("persistence_credential", &redact(&self.persistence_credential))
            .field("log_destination", &self.log_destination)
            .field("verbose", &self.verbose)
            .field("lock_file", &self.lock_file)
            .field("foreground", &self.foreground)
            .finish()
    }
}

impl Settings {
    /// Load the config file named by `args` and merge it under the flags
    pub fn resolve(args: &DaemonArgs) -> Result<Self> {
        let file = ConfigFile::load(args.device.config.as_deref())?;
        let mut settings = Self::from_parts(args, &file);
        settings.validate()?;
        settings.anchor_paths(&std::env::current_dir()?);
        Ok(settings)
    }

    /// Merge flags over file values over defaults
    pub fn from_parts(args: &DaemonArgs, file: &ConfigFile) -> Self {
        fn pick<T: Clone>(flag: &Option<T>, file: &Option<T>) -> Option<T> {
            flag.clone().or_else(|| file.clone())
        }

        let foreground = args.foreground || file.foreground.unwrap_or(false);
        let log_destination = pick(&args.log_destination, &file.log_destination)
            .or_else(|| (!foreground).then(|| PathBuf::from(DEFAULT_LOG_DESTINATION)));

        Self {
            device: DeviceSettings::from_parts(&args.device, file),
            poll_interval: args
                .poll_interval
                .or(file.poll_interval)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            weather_log_rate: args
                .weather_log_rate
                .or(file.weather_log_rate)
                .unwrap_or(DEFAULT_WEATHER_LOG_RATE),
            weather_service: pick(&args.weather_service, &file.weather_service)
                .unwrap_or_else(|| DEFAULT_WEATHER_SERVICE.to_string()),
            weather_key: pick(&args.weather_key, &file.weather_key),
            weather_location: pick(&args.weather_location, &file.weather_location),
            weather_units: pick(&args.weather_units, &file.weather_units)
                .unwrap_or_else(|| DEFAULT_WEATHER_UNITS.to_string()),
            persistence_source: pick(&args.persistence_source, &file.persistence_source)
                .unwrap_or_else(|| DEFAULT_PERSISTENCE_SOURCE.to_string()),
            persistence_user: pick(&args.persistence_user, &file.persistence_user),
            persistence_credential: pick(
                &args.persistence_credential,
                &file.persistence_credential,
            ),
            log_destination,
            verbose: args.verbose || file.verbose.unwrap_or(false),
            lock_file: pick(&args.lock_file, &file.lock_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCK_FILE)),
            foreground,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        if self.poll_interval == 0 {
            return Err(ThermologError::config("poll_interval must be greater than zero"));
        }
        Ok(())
    }

    /// Resolve relative file paths against `base`.
    ///
    /// A detached daemon runs from `/`, so paths named relative to the launch
    /// directory have to be fixed before the fork.
    pub fn anchor_paths(&mut self, base: &Path) {
        let anchor = |path: &Path| {
            if path.is_relative() {
                base.join(path)
            } else {
                path.to_path_buf()
            }
        };

        self.log_destination = self.log_destination.as_deref().map(anchor);
        self.lock_file = anchor(&self.lock_file);

        let source = &self.persistence_source;
        if !source.is_empty() && source != "memory" && !source.contains("://") {
            let local = Path::new(source.strip_prefix("file:").unwrap_or(source));
            if local.is_relative() {
                self.persistence_source = anchor(local).to_string_lossy().into_owned();
            }
        }
    }

    /// Weather logging needs a non-zero rate, a key and a location
    pub fn weather_enabled(&self) -> bool {
        self.weather_log_rate > 0
            && self.weather_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.weather_location.as_deref().is_some_and(|l| !l.is_empty())
    }
}
