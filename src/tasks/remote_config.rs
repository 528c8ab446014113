use std::sync::Arc;
use std::time::Duration;

use slog::{debug, info, o, warn, Logger};
use tokio::time::{sleep, timeout};

use crate::ble::gatt::THRESHOLD_CHAR;
use crate::ble::{Advertisement, BleError, GattConnection, GattServer};
use crate::config::MonitorConfig;
use crate::thresholds::{SharedThresholds, Thresholds};

/// Serves the threshold characteristic: advertise, publish the current limits
/// on connect, then accept validated updates until the central goes away.
pub struct ConfigTask {
    server: Arc<dyn GattServer>,
    thresholds: SharedThresholds,
    advertisement: Advertisement,
    write_timeout: Duration,
    retry_delay: Duration,
    logger: Logger,
}

impl ConfigTask {
    pub fn new(
        config: &MonitorConfig,
        thresholds: SharedThresholds,
        server: Arc<dyn GattServer>,
        logger: &Logger,
    ) -> Self {
        Self {
            server,
            thresholds,
            advertisement: config.advertising.advertisement(),
            write_timeout: config.timing.write_timeout(),
            retry_delay: config.timing.fault_backoff(),
            logger: logger.new(o!("task" => "config")),
        }
    }

    pub async fn run(&self) {
        loop {
            info!(self.logger, "Waiting for connection..."; "name" => &self.advertisement.name);
            match self.server.advertise(&self.advertisement).await {
                Ok(connection) => {
                    info!(self.logger, "Connected"; "peer" => connection.peer());
                    self.serve(connection.as_ref()).await;
                    info!(self.logger, "Disconnected");
                }
                Err(e) => {
                    warn!(self.logger, "Advertising failed"; "error" => %e);
                    sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// Handles one connection until it drops or errors.
    pub async fn serve(&self, connection: &dyn GattConnection) {
        let current = self.thresholds.snapshot().await;
        if let Err(e) = self
            .server
            .write_local(THRESHOLD_CHAR, &current.to_payload(), true)
            .await
        {
            warn!(self.logger, "Failed to publish limits"; "error" => %e);
            return;
        }

        loop {
            // the timeout only exists to notice a silent disconnect
            match timeout(self.write_timeout, connection.written(THRESHOLD_CHAR)).await {
                Err(_) => {
                    if !connection.is_connected() {
                        break;
                    }
                }
                Ok(Ok(data)) => {
                    self.apply(&data).await;
                }
                Ok(Err(BleError::Disconnected)) => break,
                Ok(Err(e)) => {
                    warn!(self.logger, "BLE error"; "error" => %e);
                    break;
                }
            }
        }
    }

    /// Validates a written payload and, if it holds, swaps in the new limits.
    /// Invalid payloads are dropped and the current limits are written back,
    /// so a read of the characteristic reflects what is actually in force.
    pub async fn apply(&self, data: &[u8]) -> Option<Thresholds> {
        match Thresholds::from_payload(data) {
            Ok(thresholds) => {
                self.thresholds.replace(thresholds).await;
                info!(self.logger, "Updated limits";
                    "min" => thresholds.min_bpm(), "max" => thresholds.max_bpm());
                Some(thresholds)
            }
            Err(e) => {
                debug!(self.logger, "Ignoring threshold write"; "error" => %e);
                let current = self.thresholds.snapshot().await;
                if let Err(e) = self
                    .server
                    .write_local(THRESHOLD_CHAR, &current.to_payload(), true)
                    .await
                {
                    warn!(self.logger, "Failed to restore limits"; "error" => %e);
                }
                None
            }
        }
    }
}
