//! Error handling for the temperature notifier.

use std::path::PathBuf;
use std::time::Duration;

/// A specialized `Result` type for temperature notifier operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Exit status for a clean run.
pub const EXIT_OK: u8 = 0;
/// Exit status for unrecoverable runtime failures.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status when another instance already holds the device lock.
pub const EXIT_LOCK_HELD: u8 = 75;
/// Exit status for configuration errors.
pub const EXIT_CONFIG: u8 = 78;

/// The main error type for monitor operations.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Another instance is already monitoring this device
    #[error("monitor for device '{device}' is already running (lock: {})", .path.display())]
    LockHeld { device: String, path: PathBuf },

    /// The lock file could not be opened or locked
    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file is not valid TOML
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("Failed to read configuration {}: {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sensor produced no usable reading
    #[error("failed to read temperature for device '{device}': {reason}")]
    Read { device: String, reason: String },

    /// A notification could not be delivered
    #[error("failed to send notification: {0}")]
    Send(#[from] SendError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by a notifier.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The underlying HTTP request failed (network, DNS, TLS, ...).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The messaging API answered with a non-2xx status.
    #[error("messaging API returned HTTP {0}")]
    HttpStatus(u16),

    /// The attempt did not finish in time.
    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}

impl MonitorError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new sensor read error
    pub fn read_error(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Read {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only affects the current iteration.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Send(_))
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::LockHeld { .. } => EXIT_LOCK_HELD,
            Self::Config(_) | Self::ConfigParse(_) | Self::ConfigIo { .. } => EXIT_CONFIG,
            _ => EXIT_FAILURE,
        }
    }
}
