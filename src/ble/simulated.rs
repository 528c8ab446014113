//! In-process peripheral
//!
//! A [`GattServer`] backed by tokio channels, plus a [`SimCentral`] handle that
//! plays the phone: it connects, writes characteristics and listens for
//! notifications. Used by the demo binary and by tests; no radio involved.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use super::{Advertisement, BleError, Characteristic, GattConnection, GattServer, Service};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

#[derive(Default)]
struct Registry {
    characteristics: HashMap<Uuid, Characteristic>,
    values: HashMap<Uuid, Vec<u8>>,
    advertisement: Option<Advertisement>,
    connected: bool,
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pending connection handed from a central to the advertising peripheral.
struct Link {
    peer: String,
    writes: mpsc::Receiver<(Uuid, Vec<u8>)>,
    connected: Arc<AtomicBool>,
}

pub struct SimPeripheral {
    registry: SharedRegistry,
    notify_tx: broadcast::Sender<Notification>,
    link_tx: mpsc::Sender<Link>,
    link_rx: AsyncMutex<mpsc::Receiver<Link>>,
}

impl SimPeripheral {
    pub fn new() -> Arc<Self> {
        let (notify_tx, _) = broadcast::channel(64);
        let (link_tx, link_rx) = mpsc::channel(1);
        Arc::new(Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            notify_tx,
            link_tx,
            link_rx: AsyncMutex::new(link_rx),
        })
    }

    /// A central that can connect to this peripheral.
    pub fn central(&self, address: impl Into<String>) -> SimCentral {
        SimCentral {
            address: address.into(),
            registry: Arc::clone(&self.registry),
            notify_tx: self.notify_tx.clone(),
            link_tx: self.link_tx.clone(),
        }
    }

    /// Current local value of a characteristic.
    pub fn value(&self, characteristic: Uuid) -> Option<Vec<u8>> {
        lock(&self.registry).values.get(&characteristic).cloned()
    }

    /// The advertisement currently on air, if any.
    pub fn advertisement(&self) -> Option<Advertisement> {
        lock(&self.registry).advertisement.clone()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.registry).connected
    }
}

#[async_trait]
impl GattServer for SimPeripheral {
    async fn register_services(&self, services: &[Service]) -> Result<(), BleError> {
        let mut registry = lock(&self.registry);
        for characteristic in services.iter().flat_map(|s| s.characteristics.iter()) {
            registry
                .characteristics
                .insert(characteristic.uuid, characteristic.clone());
        }
        Ok(())
    }

    async fn write_local(&self, characteristic: Uuid, value: &[u8], notify: bool) -> Result<(), BleError> {
        let connected = {
            let mut registry = lock(&self.registry);
            if !registry.characteristics.contains_key(&characteristic) {
                return Err(BleError::UnknownCharacteristic(characteristic));
            }
            registry.values.insert(characteristic, value.to_vec());
            registry.connected
        };

        if notify && connected {
            // no subscriber is not an error
            let _ = self.notify_tx.send(Notification {
                characteristic,
                value: value.to_vec(),
            });
        }
        Ok(())
    }

    async fn advertise(&self, advertisement: &Advertisement) -> Result<Box<dyn GattConnection>, BleError> {
        lock(&self.registry).advertisement = Some(advertisement.clone());

        let link = self
            .link_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| BleError::Advertising("link channel closed".to_string()))?;

        lock(&self.registry).advertisement = None;

        Ok(Box::new(SimConnection {
            peer: link.peer,
            writes: AsyncMutex::new(link.writes),
            connected: link.connected,
        }))
    }
}

struct SimConnection {
    peer: String,
    writes: AsyncMutex<mpsc::Receiver<(Uuid, Vec<u8>)>>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl GattConnection for SimConnection {
    async fn written(&self, characteristic: Uuid) -> Result<Vec<u8>, BleError> {
        let mut writes = self.writes.lock().await;
        loop {
            match writes.recv().await {
                Some((uuid, data)) if uuid == characteristic => return Ok(data),
                Some(_) => continue,
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(BleError::Disconnected);
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

pub struct SimCentral {
    address: String,
    registry: SharedRegistry,
    notify_tx: broadcast::Sender<Notification>,
    link_tx: mpsc::Sender<Link>,
}

impl SimCentral {
    /// Connects to the peripheral. Only one central may be connected at a time.
    pub async fn connect(&self) -> Result<SimLink, BleError> {
        {
            let mut registry = lock(&self.registry);
            if registry.connected {
                return Err(BleError::Connection(
                    "peripheral already has a central".to_string(),
                ));
            }
            registry.connected = true;
        }

        let (writes_tx, writes_rx) = mpsc::channel(16);
        let connected = Arc::new(AtomicBool::new(true));
        // subscribe before the peripheral sees the link so nothing published
        // on connect is missed
        let notifications = BroadcastStream::new(self.notify_tx.subscribe());

        let link = Link {
            peer: self.address.clone(),
            writes: writes_rx,
            connected: Arc::clone(&connected),
        };
        if self.link_tx.send(link).await.is_err() {
            lock(&self.registry).connected = false;
            return Err(BleError::Connection("peripheral gone".to_string()));
        }

        Ok(SimLink {
            registry: Arc::clone(&self.registry),
            writes: writes_tx,
            connected,
            notifications,
        })
    }
}

/// Central side of an established connection. Dropping it disconnects.
pub struct SimLink {
    registry: SharedRegistry,
    writes: mpsc::Sender<(Uuid, Vec<u8>)>,
    connected: Arc<AtomicBool>,
    notifications: BroadcastStream<Notification>,
}

impl SimLink {
    pub async fn write(&self, characteristic: Uuid, value: &[u8]) -> Result<(), BleError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BleError::Disconnected);
        }
        {
            let mut registry = lock(&self.registry);
            match registry.characteristics.get(&characteristic) {
                Some(c) if c.write => {}
                Some(_) => {
                    return Err(BleError::Gatt(format!(
                        "characteristic {} is not writable",
                        characteristic
                    )))
                }
                None => return Err(BleError::UnknownCharacteristic(characteristic)),
            }
            registry.values.insert(characteristic, value.to_vec());
        }
        self.writes
            .send((characteristic, value.to_vec()))
            .await
            .map_err(|_| BleError::Disconnected)
    }

    pub fn read(&self, characteristic: Uuid) -> Option<Vec<u8>> {
        lock(&self.registry).values.get(&characteristic).cloned()
    }

    /// Next notification pushed by the peripheral. Notifications lost to a
    /// slow reader are skipped.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        while let Some(item) = self.notifications.next().await {
            if let Ok(notification) = item {
                return Some(notification);
            }
        }
        None
    }

    pub fn disconnect(self) {}
}

impl Drop for SimLink {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        lock(&self.registry).connected = false;
    }
}
