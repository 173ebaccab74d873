//! Temperature sensor implementations.

use crate::error::{MonitorError, Result};
use crate::sensor::traits::TemperatureSensor;
use std::path::{Path, PathBuf};
use sysinfo::Components;
use tokio::process::Command;

/// Reads a sysfs thermal zone file.
///
/// The kernel reports integer millidegrees Celsius (`48312`). Files that hold
/// a decimal value (`48.3`) are taken as degrees.
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TemperatureSensor for ThermalZoneSensor {
    fn source(&self) -> &'static str {
        "thermal_zone"
    }

    async fn read(&mut self, device: &str) -> Result<f32> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MonitorError::read_error(device, format!("{}: {}", self.path.display(), e))
        })?;
        parse_thermal_zone(&raw).ok_or_else(|| {
            MonitorError::read_error(
                device,
                format!("unexpected contents in {}: {:?}", self.path.display(), raw.trim()),
            )
        })
    }
}

/// Parse a thermal zone value into degrees Celsius.
///
/// Integers are millidegrees whatever their magnitude; `500` is 0.5 °C.
pub fn parse_thermal_zone(raw: &str) -> Option<f32> {
    let raw = raw.trim();
    if let Ok(millis) = raw.parse::<i64>() {
        return Some((millis as f64 / 1000.0) as f32);
    }
    if !raw.contains('.') {
        return None;
    }
    raw.parse::<f32>().ok().filter(|t| t.is_finite())
}

/// Runs `vcgencmd measure_temp` (Raspberry Pi firmware).
#[derive(Debug, Clone, Default)]
pub struct VcgencmdSensor {
    program: String,
}

impl VcgencmdSensor {
    pub fn new() -> Self {
        Self {
            program: "vcgencmd".to_string(),
        }
    }
}

impl TemperatureSensor for VcgencmdSensor {
    fn source(&self) -> &'static str {
        "vcgencmd"
    }

    async fn read(&mut self, device: &str) -> Result<f32> {
        let output = Command::new(&self.program)
            .arg("measure_temp")
            .output()
            .await
            .map_err(|e| MonitorError::read_error(device, format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(MonitorError::read_error(
                device,
                format!("{} exited with {}", self.program, output.status),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_vcgencmd(&stdout).ok_or_else(|| {
            MonitorError::read_error(device, format!("unexpected output: {:?}", stdout.trim()))
        })
    }
}

/// Parse `temp=48.3'C` into degrees Celsius.
pub fn parse_vcgencmd(output: &str) -> Option<f32> {
    output
        .trim()
        .strip_prefix("temp=")?
        .trim_end_matches("'C")
        .parse::<f32>()
        .ok()
        .filter(|t| t.is_finite())
}

/// Reads hardware components reported by `sysinfo`.
pub struct SysinfoSensor {
    components: Components,
    label_filter: Option<String>,
}

impl SysinfoSensor {
    /// Create a sensor that picks the first component whose label contains
    /// `label_filter` (case-insensitive), or the first component otherwise.
    pub fn new(label_filter: Option<String>) -> Self {
        Self {
            components: Components::new_with_refreshed_list(),
            label_filter: label_filter.map(|l| l.to_lowercase()),
        }
    }
}

impl TemperatureSensor for SysinfoSensor {
    fn source(&self) -> &'static str {
        "sysinfo"
    }

    async fn read(&mut self, device: &str) -> Result<f32> {
        self.components.refresh();

        let component = self
            .components
            .iter()
            .filter(|c| c.temperature().is_finite())
            .find(|c| match &self.label_filter {
                Some(filter) => c.label().to_lowercase().contains(filter.as_str()),
                None => true,
            })
            .ok_or_else(|| {
                MonitorError::read_error(
                    device,
                    match &self.label_filter {
                        Some(filter) => format!("no temperature component matching '{}'", filter),
                        None => "no temperature components available".to_string(),
                    },
                )
            })?;

        tracing::debug!(device, component = component.label(), "Using sysinfo component");
        Ok(component.temperature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_thermal_zone() {
        assert_eq!(parse_thermal_zone("48312\n"), Some(48.312));
        assert_eq!(parse_thermal_zone("48.5"), Some(48.5));
        assert_eq!(parse_thermal_zone("-5000"), Some(-5.0));
        assert_eq!(parse_thermal_zone("500\n"), Some(0.5));
        assert_eq!(parse_thermal_zone("-500"), Some(-0.5));
        assert_eq!(parse_thermal_zone("0"), Some(0.0));
        assert_eq!(parse_thermal_zone("inf"), None);
        assert_eq!(parse_thermal_zone("NaN"), None);
        assert_eq!(parse_thermal_zone("garbage"), None);
        assert_eq!(parse_thermal_zone(""), None);
    }

    #[test]
    fn test_parse_vcgencmd() {
        assert_eq!(parse_vcgencmd("temp=48.3'C\n"), Some(48.3));
        assert_eq!(parse_vcgencmd("temp=61.0'C"), Some(61.0));
        assert_eq!(parse_vcgencmd("error"), None);
        assert_eq!(parse_vcgencmd("temp=abc'C"), None);
    }

    #[tokio::test]
    async fn test_thermal_zone_sensor_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "65000").unwrap();

        let mut sensor = ThermalZoneSensor::new(file.path());
        let temp = sensor.read("device1").await.unwrap();
        assert_eq!(temp, 65.0);
    }

    #[tokio::test]
    async fn test_cold_thermal_zone_is_not_an_alert() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "500").unwrap();

        let mut sensor = ThermalZoneSensor::new(file.path());
        let temp = sensor.read("device1").await.unwrap();
        assert_eq!(temp, 0.5);

        let mut evaluator =
            crate::threshold::ThresholdEvaluator::new(crate::threshold::ThresholdRule::defaults())
                .unwrap();
        assert_eq!(
            evaluator.evaluate(temp),
            crate::threshold::NotificationDecision::Unchanged { level: None }
        );
    }

    #[tokio::test]
    async fn test_thermal_zone_sensor_missing_file() {
        let mut sensor = ThermalZoneSensor::new("/nonexistent/thermal_zone0/temp");
        let err = sensor.read("device1").await.unwrap_err();
        assert!(matches!(err, MonitorError::Read { ref device, .. } if device == "device1"));
    }

    #[tokio::test]
    async fn test_vcgencmd_missing_binary() {
        let mut sensor = VcgencmdSensor {
            program: "vcgencmd-does-not-exist".to_string(),
        };
        assert!(sensor.read("device1").await.is_err());
    }
}
