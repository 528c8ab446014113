//! Heart rate alert limits and the cell that shares them between the two loops.

use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

pub const BPM_BOUNDS: RangeInclusive<u8> = 30..=200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("Limits out of range: {min}-{max} (allowed 30-200)")]
    OutOfRange { min: u8, max: u8 },

    #[error("Minimum {min} is not below maximum {max}")]
    NotIncreasing { min: u8, max: u8 },

    #[error("Threshold payload too short: {0} bytes")]
    ShortPayload(usize),
}

/// Alert limits in beats per minute.
///
/// Always satisfies `30 <= min_bpm < max_bpm <= 200`; the only way to build one
/// is through [`Thresholds::new`] or [`Thresholds::from_payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(u8, u8)", into = "(u8, u8)")]
pub struct Thresholds {
    min_bpm: u8,
    max_bpm: u8,
}

impl Thresholds {
    pub fn new(min_bpm: u8, max_bpm: u8) -> Result<Self, ThresholdError> {
        if !BPM_BOUNDS.contains(&min_bpm) || !BPM_BOUNDS.contains(&max_bpm) {
            return Err(ThresholdError::OutOfRange {
                min: min_bpm,
                max: max_bpm,
            });
        }
        if min_bpm >= max_bpm {
            return Err(ThresholdError::NotIncreasing {
                min: min_bpm,
                max: max_bpm,
            });
        }
        Ok(Self { min_bpm, max_bpm })
    }

    /// Decodes `[min_bpm, max_bpm]`; trailing bytes are ignored.
    pub fn from_payload(data: &[u8]) -> Result<Self, ThresholdError> {
        match data {
            [min, max, ..] => Self::new(*min, *max),
            _ => Err(ThresholdError::ShortPayload(data.len())),
        }
    }

    pub fn to_payload(&self) -> [u8; 2] {
        [self.min_bpm, self.max_bpm]
    }

    pub fn min_bpm(&self) -> u8 {
        self.min_bpm
    }

    pub fn max_bpm(&self) -> u8 {
        self.max_bpm
    }

    pub fn contains(&self, bpm: u32) -> bool {
        (u32::from(self.min_bpm)..=u32::from(self.max_bpm)).contains(&bpm)
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_bpm: 50,
            max_bpm: 120,
        }
    }
}

impl TryFrom<(u8, u8)> for Thresholds {
    type Error = ThresholdError;

    fn try_from((min, max): (u8, u8)) -> Result<Self, Self::Error> {
        Self::new(min, max)
    }
}

impl From<Thresholds> for (u8, u8) {
    fn from(t: Thresholds) -> Self {
        (t.min_bpm, t.max_bpm)
    }
}

/// Thresholds shared between the config loop (sole writer) and the sensing
/// loop (reader). Updates swap the whole struct under one write guard, so a
/// reader sees either the old pair or the new pair, never a mix.
#[derive(Clone, Debug)]
pub struct SharedThresholds {
    inner: Arc<RwLock<Thresholds>>,
}

impl SharedThresholds {
    pub fn new(initial: Thresholds) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn snapshot(&self) -> Thresholds {
        *self.inner.read().await
    }

    /// Replaces the current limits, returning the previous ones.
    pub async fn replace(&self, thresholds: Thresholds) -> Thresholds {
        let mut guard = self.inner.write().await;
        std::mem::replace(&mut *guard, thresholds)
    }
}

impl Default for SharedThresholds {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}
