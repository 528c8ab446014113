//! Runs the monitor against a simulated sensor and an in-process BLE
//! peripheral, with a scripted phone connecting to it. Stop with Ctrl-C.
//!
//! Usage: pulsewatch_sim [config.json]

use std::time::Duration;

use futures::future::FutureExt;
use slog::{info, warn, Logger};
use tokio::time::sleep;

use pwcore::ble::gatt::{HEART_RATE_MEASUREMENT, SPO2_CHAR, THRESHOLD_CHAR};
use pwcore::ble::simulated::{SimCentral, SimPeripheral};
use pwcore::log::create_logger;
use pwcore::mock::{MockActuator, MockSensor};
use pwcore::{MonitorConfig, PulseWatchCore};

async fn phone(central: SimCentral, logger: Logger) {
    loop {
        let mut link = match central.connect().await {
            Ok(link) => link,
            Err(e) => {
                warn!(logger, "Phone failed to connect"; "error" => %e);
                sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        // tighten the limits once, then just listen for a while
        if let Err(e) = link.write(THRESHOLD_CHAR, &[60, 100]).await {
            warn!(logger, "Phone failed to write limits"; "error" => %e);
        }

        let listen = async {
            while let Some(n) = link.next_notification().await {
                match n.characteristic {
                    c if c == HEART_RATE_MEASUREMENT => {
                        info!(logger, "Phone got heart rate"; "bpm" => n.value.get(1).copied())
                    }
                    c if c == SPO2_CHAR => {
                        info!(logger, "Phone got SpO2"; "percent" => n.value.first().copied())
                    }
                    _ => info!(logger, "Phone got limits"; "payload" => ?n.value),
                }
            }
        };
        tokio::select! {
            _ = listen => {}
            _ = sleep(Duration::from_secs(20)) => {}
        }

        link.disconnect();
        sleep(Duration::from_secs(2)).await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = create_logger("pulsewatch_sim");

    let config = match std::env::args().nth(1) {
        Some(path) => MonitorConfig::from_json_file(path)?,
        None => MonitorConfig::default(),
    };

    let peripheral = SimPeripheral::new();
    let sensor = MockSensor::new(72.0)
        .with_finger_off(Duration::from_secs(30)..Duration::from_secs(35));

    let core = PulseWatchCore::new(
        config,
        sensor,
        MockActuator::new(),
        peripheral.clone(),
        logger.clone(),
    )
    .await?;

    tokio::spawn(phone(peripheral.central("sim-phone"), logger.clone()));

    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    core.run(shutdown).await;
    Ok(())
}
