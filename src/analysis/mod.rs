//! Signal processing for the pulse oximeter: smoothing, peak detection,
//! heart rate and SpO2 estimation.

pub mod filter;
pub mod ppg;
pub mod spo2;

pub use ppg::{HeartRateEngine, Parameters, Peak};
