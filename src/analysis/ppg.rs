use std::time::Instant;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::analysis::filter::{midpoint_threshold, moving_average};
use crate::analysis::spo2;
use crate::storage::SignalWindow;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Samples kept in the sliding window (W).
    pub window_size: usize,
    /// Raw IR values averaged into each smoothed sample (S).
    pub smoothing_window: usize,
    /// Samples required in both channels before SpO2 is estimated.
    pub min_spo2_samples: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            window_size: 50,
            smoothing_window: 5,
            min_spo2_samples: 10,
        }
    }
}

/// A local maximum of the smoothed IR signal above the window's midpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub timestamp: Instant,
    pub value: f64,
}

/// Streaming heart rate and SpO2 estimation over a fixed sliding window.
///
/// Pure computation: samples go in through [`HeartRateEngine::add_sample`],
/// estimates come out of [`HeartRateEngine::heart_rate`] and
/// [`HeartRateEngine::spo2`]. Peaks are recomputed from the window on every
/// query and never cached.
pub struct HeartRateEngine {
    params: Parameters,
    window: SignalWindow,
}

impl HeartRateEngine {
    pub fn new(params: Parameters) -> Self {
        let window = SignalWindow::new(params.window_size.max(1));
        Self { params, window }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn add_sample(&mut self, ir: u32, red: u32, now: Instant) {
        self.window.push_raw(ir, red, now);

        // warm-up: the raw value stands in until S readings have arrived
        let recent = self.window.recent_ir(self.params.smoothing_window);
        let smoothed = if recent.len() >= self.params.smoothing_window {
            moving_average(recent).unwrap_or(f64::from(ir))
        } else {
            f64::from(ir)
        };
        self.window.push_smoothed(smoothed);
    }

    /// Drops every buffered sample so the next one starts a fresh window.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn find_peaks(&self) -> Vec<Peak> {
        let smoothed = self.window.smoothed();
        if smoothed.len() < 3 {
            return Vec::new();
        }

        let recent_start = smoothed.len().saturating_sub(self.params.window_size);
        let Some(threshold) = midpoint_threshold(ArrayView1::from(&smoothed[recent_start..]))
        else {
            return Vec::new();
        };

        smoothed
            .windows(3)
            .enumerate()
            .filter(|(_, w)| w[1] > threshold && w[0] < w[1] && w[1] > w[2])
            .filter_map(|(i, w)| {
                self.window.timestamp(i + 1).map(|timestamp| Peak {
                    timestamp,
                    value: w[1],
                })
            })
            .collect()
    }

    /// Beats per minute from the mean interval between detected peaks.
    pub fn heart_rate(&self) -> Option<f64> {
        let peaks = self.find_peaks();
        if peaks.len() < 2 {
            return None;
        }

        let intervals: Vec<f64> = peaks
            .windows(2)
            .map(|w| {
                w[1].timestamp
                    .saturating_duration_since(w[0].timestamp)
                    .as_secs_f64()
                    * 1000.0
            })
            .collect();
        let average_interval = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if average_interval <= 0.0 {
            return None;
        }

        Some(60_000.0 / average_interval)
    }

    pub fn spo2(&self) -> Option<u8> {
        spo2::estimate(
            self.window.ir(),
            self.window.red(),
            self.params.min_spo2_samples,
        )
    }
}
