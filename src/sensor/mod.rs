//! Temperature sensor readers.
//!
//! This module provides the sources a reading can come from on a Raspberry
//! Pi: the sysfs thermal zone, the `vcgencmd` firmware tool, and the hardware
//! components exposed by `sysinfo`.

pub mod data;
pub mod reader;
pub mod traits;

// Re-export commonly used items
pub use data::TemperatureReading;
pub use reader::{SysinfoSensor, ThermalZoneSensor, VcgencmdSensor};
pub use traits::{TemperatureSensor, take_reading};

use crate::config::{SensorConfig, SensorSource};

/// A sensor chosen at runtime from configuration.
pub enum ConfiguredSensor {
    ThermalZone(ThermalZoneSensor),
    Vcgencmd(VcgencmdSensor),
    Sysinfo(SysinfoSensor),
}

impl ConfiguredSensor {
    /// Build the sensor named by the `[sensor]` section.
    pub fn from_config(config: &SensorConfig) -> Self {
        match config.source {
            SensorSource::ThermalZone => Self::ThermalZone(ThermalZoneSensor::new(&config.path)),
            SensorSource::Vcgencmd => Self::Vcgencmd(VcgencmdSensor::new()),
            SensorSource::Sysinfo => Self::Sysinfo(SysinfoSensor::new(config.component.clone())),
        }
    }
}

impl TemperatureSensor for ConfiguredSensor {
    fn source(&self) -> &'static str {
        match self {
            Self::ThermalZone(s) => s.source(),
            Self::Vcgencmd(s) => s.source(),
            Self::Sysinfo(s) => s.source(),
        }
    }

    async fn read(&mut self, device: &str) -> crate::Result<f32> {
        match self {
            Self::ThermalZone(s) => s.read(device).await,
            Self::Vcgencmd(s) => s.read(device).await,
            Self::Sysinfo(s) => s.read(device).await,
        }
    }
}
