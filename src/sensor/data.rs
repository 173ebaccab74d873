//! Data structures for temperature readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single temperature sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureReading {
    /// Device the sample belongs to
    pub device: String,
    /// Temperature in Celsius
    pub celsius: f32,
    /// Sensor source that produced the value (e.g. "thermal_zone")
    pub source: String,
    /// When the sample was taken
    pub taken_at: DateTime<Utc>,
}

impl TemperatureReading {
    /// Create a reading stamped with the current time.
    pub fn new(device: impl Into<String>, celsius: f32, source: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            celsius,
            source: source.into(),
            taken_at: Utc::now(),
        }
    }
}
