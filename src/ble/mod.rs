//! Peripheral-side BLE contract: the device registers its GATT services,
//! advertises until one central connects, publishes characteristic values and
//! receives writes from that central.

pub mod gatt;
pub mod simulated;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use gatt::{Characteristic, Reading, ReadingKind, Service};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    #[error("Advertising error: {0}")]
    Advertising(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("GATT error: {0}")]
    Gatt(String),

    #[error("Unknown characteristic {0}")]
    UnknownCharacteristic(Uuid),

    #[error("Peer disconnected")]
    Disconnected,

    #[error("Operation timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub name: String,
    pub interval: Duration,
    pub services: Vec<Uuid>,
}

/// Local GATT server of the device.
#[async_trait]
pub trait GattServer: Send + Sync {
    async fn register_services(&self, services: &[Service]) -> Result<(), BleError>;

    /// Stores `value` as the characteristic's current value and, if `notify`
    /// is set, pushes it to the connected central. Without a central the
    /// notification is dropped and the call still succeeds.
    async fn write_local(&self, characteristic: Uuid, value: &[u8], notify: bool) -> Result<(), BleError>;

    /// Advertises until a central connects.
    async fn advertise(&self, advertisement: &Advertisement) -> Result<Box<dyn GattConnection>, BleError>;
}

/// The one active link to a central.
#[async_trait]
pub trait GattConnection: Send + Sync {
    /// Waits for the central to write `characteristic`. Fails with
    /// [`BleError::Disconnected`] once the link drops.
    async fn written(&self, characteristic: Uuid) -> Result<Vec<u8>, BleError>;

    fn is_connected(&self) -> bool;

    fn peer(&self) -> &str;
}
