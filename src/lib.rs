//! # Temp Notifier - Raspberry Pi Temperature Alerts
//!
//! Samples a device temperature, compares it against configured thresholds
//! and sends a Telegram message when a higher threshold is reached. Only one
//! monitor runs per device at a time, and a monitor stopped by a signal
//! always tries to say so before it exits.
//!
//! ## Features
//!
//! - **Edge-triggered alerts**: one message per newly reached threshold
//! - **Single instance per device**: non-blocking OS file lock
//! - **One-shot or continuous**: run from cron or as a long-lived service
//! - **Graceful shutdown**: SIGINT/SIGTERM send a final notice and free the lock
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use temp_notifier::{ConfiguredSensor, MonitorConfig, RunController, TelegramNotifier};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::load("config.toml", "device1")?;
//!     let sensor = ConfiguredSensor::from_config(&config.sensor);
//!     let notifier = TelegramNotifier::new(&config.telegram)?;
//!
//!     let mut controller = RunController::new(&config, sensor, notifier, CancellationToken::new())?;
//!     controller.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod lock;
pub mod notify;
pub mod sensor;
pub mod threshold;

// Re-export public API
pub use config::{MonitorConfig, SensorSource, DEFAULT_DEVICE};
pub use controller::{IterationOutcome, RunController, RunState, RunSummary};
pub use error::{MonitorError, Result, SendError};
pub use lock::RunLock;
pub use notify::{send_with_retry, Notifier, RetryPolicy, TelegramNotifier, SHUTDOWN_MESSAGE};
pub use sensor::{ConfiguredSensor, TemperatureReading, TemperatureSensor};
pub use threshold::{Alert, NotificationDecision, ThresholdEvaluator, ThresholdRule};
