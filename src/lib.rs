//! On-device core of a pulse-oximetry monitor.
//!
//! Two loops share one cooperative task: the sensing loop turns raw IR/red
//! samples into heart rate and SpO2, publishes them over BLE and drives the
//! alarm buzzer; the config loop lets a connected phone change the alarm
//! limits. See [`PulseWatchCore`].

use std::future::Future;
use std::sync::Arc;

use slog::{info, Logger};
use thiserror::Error;

pub mod alarm;
pub mod analysis;
pub mod ble;
pub mod config;
pub mod log;
pub mod mock;
pub mod sensor;
pub mod storage;
pub mod tasks;
pub mod thresholds;

pub use alarm::{Actuator, AlarmController, AlarmState};
pub use analysis::HeartRateEngine;
pub use ble::{GattConnection, GattServer, Reading};
pub use config::{ConfigError, MonitorConfig};
pub use sensor::{SampleSource, SensorError};
pub use tasks::{ConfigTask, SensingTask};
pub use thresholds::{SharedThresholds, Thresholds};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Sensor setup failed: {0}")]
    Sensor(#[from] SensorError),

    #[error("GATT setup failed: {0}")]
    Ble(#[from] ble::BleError),
}

pub struct PulseWatchCore<S, A> {
    sensing: SensingTask<S, A>,
    config: ConfigTask,
    thresholds: SharedThresholds,
    logger: Logger,
}

impl<S: SampleSource, A: Actuator> PulseWatchCore<S, A> {
    /// Configures the sensor, registers the GATT services and builds both loops.
    pub async fn new(
        config: MonitorConfig,
        mut source: S,
        actuator: A,
        server: Arc<dyn GattServer>,
        logger: Logger,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        source.configure(&config.sensor)?;
        server.register_services(&ble::gatt::services()).await?;

        let thresholds = SharedThresholds::new(config.thresholds);
        let sensing = SensingTask::new(
            &config,
            source,
            actuator,
            thresholds.clone(),
            Arc::clone(&server),
            &logger,
        );
        let config_task = ConfigTask::new(&config, thresholds.clone(), server, &logger);

        info!(logger, "Starting PulseWatchCore";
            "min" => config.thresholds.min_bpm(), "max" => config.thresholds.max_bpm());
        Ok(Self {
            sensing,
            config: config_task,
            thresholds,
            logger,
        })
    }

    pub fn thresholds(&self) -> SharedThresholds {
        self.thresholds.clone()
    }

    /// Runs both loops until `shutdown` resolves, then turns the buzzer off.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        {
            let sensing = self.sensing.run();
            let config = self.config.run();
            tokio::select! {
                _ = sensing => {}
                _ = config => {}
                _ = shutdown => {
                    info!(self.logger, "Stopped");
                }
            }
        }
        self.sensing.silence();
    }
}
