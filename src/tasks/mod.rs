//! The two long-lived control loops. Both run on one cooperative task; they
//! only meet through [`crate::thresholds::SharedThresholds`] and the GATT server.

pub mod remote_config;
pub mod sensing;

pub use remote_config::ConfigTask;
pub use sensing::{Gate, SensingError, SensingTask};
