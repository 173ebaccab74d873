//! Traits for temperature sensors.

use crate::error::{MonitorError, Result};
use crate::sensor::data::TemperatureReading;
use std::future::Future;

/// Trait for reading a device temperature.
///
/// Implementations return the temperature in degrees Celsius or a
/// [`MonitorError::Read`] when the sensor is unavailable. Callers never retry
/// a failed read; the sample is simply skipped.
pub trait TemperatureSensor {
    /// Short name of the underlying source, used in logs.
    fn source(&self) -> &'static str;

    /// Read the current temperature for `device`.
    fn read(&mut self, device: &str) -> impl Future<Output = Result<f32>> + Send;
}

/// Read a sensor and wrap the value in a [`TemperatureReading`].
///
/// Non-finite values are reported as read errors so they never reach
/// threshold evaluation.
pub async fn take_reading<S>(sensor: &mut S, device: &str) -> Result<TemperatureReading>
where
    S: TemperatureSensor + Send,
{
    let celsius = sensor.read(device).await?;
    if !celsius.is_finite() {
        return Err(MonitorError::read_error(
            device,
            format!("{} returned a non-finite value", sensor.source()),
        ));
    }
    Ok(TemperatureReading::new(device, celsius, sensor.source()))
}
