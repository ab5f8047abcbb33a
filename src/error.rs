//! Error types for the thermolog daemon and command surface
//!
//! Errors are grouped by how far they are allowed to travel: transient device and
//! service failures are contained by the poll loop, fatal startup failures abort the
//! process before it starts polling.

use thiserror::Error;

/// Result type alias for thermolog operations
pub type Result<T> = std::result::Result<T, ThermologError>;

/// Error types for thermolog operations
#[derive(Error, Debug)]
pub enum ThermologError {
    /// A thermostat could not be reached or refused the session
    #[error("Device error: {0}")]
    Device(String),

    /// A status frame could not be turned into a snapshot
    #[error("Decode error: {0}")]
    Decode(String),

    /// Device or service call exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Weather service failures
    #[error("Weather service error: {0}")]
    Weather(String),

    /// Persistence failures
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another daemon instance holds the lock
    #[error("Instance lock held: {0}")]
    InstanceLocked(String),

    /// Detaching from the terminal failed
    #[error("Daemonization failed: {0}")]
    Daemonize(String),

    /// Invalid input on the interactive surface
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error classes as seen by the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// One device's read or decode failed; skipped for this cycle
    TransientDevice,
    /// The weather fetch failed; retried on the next eligible cycle
    TransientService,
    /// A store write or read failed
    Persistence,
    /// The process must not enter the running state
    FatalStartup,
    /// Bad command on the interactive surface
    UserInput,
}

impl ThermologError {
    /// Create a device error
    pub fn device<S: Into<String>>(msg: S) -> Self {
        Self::Device(msg.into())
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a weather service error
    pub fn weather<S: Into<String>>(msg: S) -> Self {
        Self::Weather(msg.into())
    }

    /// Create a database error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an instance lock error
    pub fn instance_locked<S: Into<String>>(msg: S) -> Self {
        Self::InstanceLocked(msg.into())
    }

    /// Create a daemonization error
    pub fn daemonize<S: Into<String>>(msg: S) -> Self {
        Self::Daemonize(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Map the error onto the class that decides how far it may propagate
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Device(_) | Self::Decode(_) | Self::Timeout(_) | Self::Json(_) => {
                ErrorClass::TransientDevice
            }
            Self::Weather(_) | Self::Http(_) => ErrorClass::TransientService,
            Self::Database(_) => ErrorClass::Persistence,
            Self::Config(_) | Self::InstanceLocked(_) | Self::Daemonize(_) => {
                ErrorClass::FatalStartup
            }
            Self::InvalidInput(_) => ErrorClass::UserInput,
            Self::Io(_) => ErrorClass::TransientDevice,
        }
    }

    /// Whether the error must stop the process
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::FatalStartup
    }

    /// Process exit code used when this error ends the process
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Daemonize(_) => 2,
            Self::InvalidInput(_) => 0,
            _ => 1,
        }
    }
}

#[cfg(feature = "libsql")]
impl From<libsql::Error> for ThermologError {
    fn from(error: libsql::Error) -> Self {
        Self::Database(error.to_string())
    }
}
