//! Interface to the pulse-oximetry front end. The driver itself lives outside
//! this crate; the sensing loop only sees [`SampleSource`].

use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("Sensor bus error: {0}")]
    Bus(String),

    #[error("Sensor not responding")]
    NotResponding,

    #[error("Sensor FIFO overflow")]
    FifoOverflow,
}

/// One infrared/red reading pair with its arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: Instant,
    pub ir: u32,
    pub red: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedAmplitude {
    Low,
    #[default]
    Medium,
    High,
}

/// Acquisition settings applied once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Internal sample rate in Hz.
    pub sample_rate: u16,
    /// Number of readings averaged into each FIFO entry.
    pub fifo_average: u8,
    pub led_amplitude: LedAmplitude,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            sample_rate: 400,
            fifo_average: 8,
            led_amplitude: LedAmplitude::Medium,
        }
    }
}

pub trait SampleSource {
    fn configure(&mut self, _settings: &SensorSettings) -> Result<(), SensorError> {
        Ok(())
    }

    /// Polls the hardware and moves fresh readings into local storage.
    fn check(&mut self) -> Result<(), SensorError>;

    fn available(&self) -> bool;

    fn pop_ir(&mut self) -> u32;

    fn pop_red(&mut self) -> u32;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn configure(&mut self, settings: &SensorSettings) -> Result<(), SensorError> {
        (**self).configure(settings)
    }

    fn check(&mut self) -> Result<(), SensorError> {
        (**self).check()
    }

    fn available(&self) -> bool {
        (**self).available()
    }

    fn pop_ir(&mut self) -> u32 {
        (**self).pop_ir()
    }

    fn pop_red(&mut self) -> u32 {
        (**self).pop_red()
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn configure(&mut self, settings: &SensorSettings) -> Result<(), SensorError> {
        (**self).configure(settings)
    }

    fn check(&mut self) -> Result<(), SensorError> {
        (**self).check()
    }

    fn available(&self) -> bool {
        (**self).available()
    }

    fn pop_ir(&mut self) -> u32 {
        (**self).pop_ir()
    }

    fn pop_red(&mut self) -> u32 {
        (**self).pop_red()
    }
}
