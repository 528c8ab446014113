//! Tunable parameters of the monitor. Defaults match the shipped firmware;
//! any subset can be overridden from a JSON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alarm::DutyCycle;
use crate::analysis::Parameters;
use crate::ble::{gatt, Advertisement};
use crate::sensor::SensorSettings;
use crate::thresholds::Thresholds;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub engine: Parameters,
    /// IR level below which the sensor is considered uncovered.
    pub no_finger_threshold: u32,
    /// Alert limits in effect until a central writes new ones.
    pub thresholds: Thresholds,
    pub timing: Timing,
    pub advertising: AdvertisingConfig,
    pub sensor: SensorSettings,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            engine: Parameters::default(),
            no_finger_threshold: 50_000,
            thresholds: Thresholds::default(),
            timing: Timing::default(),
            advertising: AdvertisingConfig::default(),
            sensor: SensorSettings::default(),
        }
    }
}

/// Loop delays, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub alarm_on_ms: u64,
    pub alarm_off_ms: u64,
    pub idle_poll_ms: u64,
    pub no_finger_delay_ms: u64,
    pub fault_backoff_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            alarm_on_ms: 200,
            alarm_off_ms: 200,
            idle_poll_ms: 50,
            no_finger_delay_ms: 500,
            fault_backoff_ms: 1000,
            write_timeout_ms: 1000,
        }
    }
}

impl Timing {
    pub fn duty_cycle(&self) -> DutyCycle {
        DutyCycle {
            on: Duration::from_millis(self.alarm_on_ms),
            off: Duration::from_millis(self.alarm_off_ms),
        }
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn no_finger_delay(&self) -> Duration {
        Duration::from_millis(self.no_finger_delay_ms)
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_millis(self.fault_backoff_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertisingConfig {
    pub name: String,
    pub interval_us: u64,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            name: "PicoW-HR".to_string(),
            interval_us: 250_000,
        }
    }
}

impl AdvertisingConfig {
    pub fn advertisement(&self) -> Advertisement {
        Advertisement {
            name: self.name.clone(),
            interval: Duration::from_micros(self.interval_us),
            services: vec![
                gatt::HEART_RATE_SERVICE,
                gatt::SPO2_SERVICE,
                gatt::THRESHOLD_SERVICE,
            ],
        }
    }
}

impl MonitorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.window_size < 3 {
            return Err(ConfigError::Invalid(format!(
                "window_size must be at least 3, got {}",
                engine.window_size
            )));
        }
        if engine.smoothing_window == 0 || engine.smoothing_window > engine.window_size {
            return Err(ConfigError::Invalid(format!(
                "smoothing_window must be within 1..={}, got {}",
                engine.window_size, engine.smoothing_window
            )));
        }
        if engine.min_spo2_samples == 0 || engine.min_spo2_samples > engine.window_size {
            return Err(ConfigError::Invalid(format!(
                "min_spo2_samples must be within 1..={}, got {}",
                engine.window_size, engine.min_spo2_samples
            )));
        }

        let t = &self.timing;
        let delays = [
            ("alarm_on_ms", t.alarm_on_ms),
            ("alarm_off_ms", t.alarm_off_ms),
            ("idle_poll_ms", t.idle_poll_ms),
            ("no_finger_delay_ms", t.no_finger_delay_ms),
            ("fault_backoff_ms", t.fault_backoff_ms),
            ("write_timeout_ms", t.write_timeout_ms),
        ];
        if let Some((name, _)) = delays.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
        }

        if self.advertising.name.is_empty() {
            return Err(ConfigError::Invalid("advertising name is empty".to_string()));
        }
        Ok(())
    }
}
