//! Monitor configuration.
//!
//! Configuration is a TOML file with a `[telegram]` section holding the bot
//! credentials, optional `[monitor]` and `[sensor]` sections, and an optional
//! list of `[[thresholds]]`. The file is read once at startup and the
//! resulting [`MonitorConfig`] is passed by reference to everything else.

use crate::error::{MonitorError, Result};
use crate::lock::validate_device_name;
use crate::threshold::ThresholdRule;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device name used when none is given on the command line.
pub const DEFAULT_DEVICE: &str = "device1";

/// Default Telegram Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Default log file name, placed next to the configuration file.
pub const DEFAULT_LOG_FILE: &str = "temps.log";

/// Default sysfs path for the SoC temperature.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where temperature readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSource {
    /// A sysfs thermal zone file (millidegrees Celsius).
    #[default]
    ThermalZone,
    /// The Raspberry Pi `vcgencmd measure_temp` command.
    Vcgencmd,
    /// Hardware components reported by `sysinfo`.
    Sysinfo,
}

/// Telegram credentials and endpoint.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

/// Sensor selection.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub source: SensorSource,
    /// File to read for [`SensorSource::ThermalZone`].
    pub path: PathBuf,
    /// Component label filter for [`SensorSource::Sysinfo`].
    pub component: Option<String>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            source: SensorSource::ThermalZone,
            path: PathBuf::from(DEFAULT_THERMAL_ZONE),
            component: None,
        }
    }
}

/// Fully validated monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Device being monitored; keys the run lock.
    pub device_name: String,
    pub telegram: TelegramConfig,
    /// Ascending, strictly increasing threshold rules.
    pub thresholds: Vec<ThresholdRule>,
    /// Sampling interval. `None` means one-shot mode.
    pub interval: Option<Duration>,
    pub lock_dir: PathBuf,
    pub log_file: PathBuf,
    pub sensor: SensorConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    #[serde(alias = "Telegram")]
    telegram: RawTelegram,
    monitor: RawMonitor,
    sensor: RawSensor,
    thresholds: Vec<RawThreshold>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTelegram {
    bot_token: Option<String>,
    chat_id: Option<String>,
    api_base: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMonitor {
    interval_secs: Option<u64>,
    lock_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSensor {
    source: SensorSource,
    path: Option<PathBuf>,
    component: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawThreshold {
    limit: f32,
    message: String,
}

impl MonitorConfig {
    /// Load the configuration file, apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read, is not valid
    /// TOML, lacks `bot_token`/`chat_id`, or defines invalid thresholds.
    pub fn load(path: impl AsRef<Path>, device_name: &str) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| MonitorError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let mut raw: RawConfig = toml::from_str(&content)?;
        raw.telegram.apply_env_overrides();

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_raw(raw, device_name, base_dir)
    }

    /// Build a configuration from TOML text. Relative paths resolve against
    /// `base_dir`. Environment overrides are not applied.
    pub fn from_toml_str(content: &str, device_name: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::from_raw(raw, device_name, base_dir)
    }

    fn from_raw(raw: RawConfig, device_name: &str, base_dir: &Path) -> Result<Self> {
        let device_name = device_name.trim();
        validate_device_name(device_name)?;

        let telegram = TelegramConfig {
            bot_token: required(raw.telegram.bot_token, "bot_token")?,
            chat_id: required(raw.telegram.chat_id, "chat_id")?,
            api_base: raw
                .telegram
                .api_base
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            request_timeout: Duration::from_secs(
                raw.telegram.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1),
            ),
        };

        let thresholds = if raw.thresholds.is_empty() {
            ThresholdRule::defaults()
        } else {
            let rules = raw
                .thresholds
                .into_iter()
                .map(|t| ThresholdRule::new(t.limit, t.message))
                .collect();
            ThresholdRule::validate_ordered(rules)?
        };

        let interval = match raw.monitor.interval_secs {
            None | Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        };

        let lock_dir = raw
            .monitor
            .lock_dir
            .map(|dir| resolve(base_dir, dir))
            .unwrap_or_else(std::env::temp_dir);
        let log_file = resolve(
            base_dir,
            raw.monitor
                .log_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        );

        let sensor = SensorConfig {
            source: raw.sensor.source,
            path: raw
                .sensor
                .path
                .map(|p| resolve(base_dir, p))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_THERMAL_ZONE)),
            component: raw.sensor.component,
        };

        Ok(Self {
            device_name: device_name.to_string(),
            telegram,
            thresholds,
            interval,
            lock_dir,
            log_file,
            sensor,
        })
    }

    /// Override the sampling interval. Zero selects one-shot mode.
    pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval.filter(|d| !d.is_zero());
        self
    }

    /// Whether the monitor samples in a loop rather than once.
    pub fn is_continuous(&self) -> bool {
        self.interval.is_some()
    }
}

impl RawTelegram {
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TEMP_NOTIFIER_BOT_TOKEN") {
            self.bot_token = Some(val);
        }
        if let Ok(val) = std::env::var("TEMP_NOTIFIER_CHAT_ID") {
            self.chat_id = Some(val);
        }
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    // Older configs quote the value inside the string.
    let value = value
        .map(|v| v.trim().trim_matches('"').to_string())
        .unwrap_or_default();
    if value.is_empty() {
        return Err(MonitorError::config_error(format!(
            "telegram.{key} is required"
        )));
    }
    Ok(value)
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}
