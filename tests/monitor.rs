use std::time::Duration;

use tokio::time::{sleep, sleep_until, timeout, Instant};

use pwcore::ble::gatt::{HEART_RATE_MEASUREMENT, SPO2_CHAR, THRESHOLD_CHAR};
use pwcore::ble::simulated::{Notification, SimLink, SimPeripheral};
use pwcore::log;
use pwcore::mock::{MockActuator, MockSensor};
use pwcore::sensor::{LedAmplitude, SensorError, SensorSettings};
use pwcore::{MonitorConfig, PulseWatchCore, StartupError, Thresholds};

async fn next_on(link: &mut SimLink, characteristic: uuid::Uuid) -> Notification {
    loop {
        let n = link
            .next_notification()
            .await
            .expect("notification stream ended");
        if n.characteristic == characteristic {
            return n;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn monitor_end_to_end() {
    let start = Instant::now();
    let peripheral = SimPeripheral::new();
    let actuator = MockActuator::new();
    let sensor = MockSensor::new(60.0)
        .with_noise(0.0)
        .with_faults([SensorError::NotResponding])
        .with_finger_off(Duration::from_secs(20)..Duration::from_secs(25));

    // wide open until the phone tightens them
    let config = MonitorConfig {
        thresholds: Thresholds::new(30, 200).unwrap(),
        ..MonitorConfig::default()
    };
    let core = PulseWatchCore::new(
        config,
        sensor,
        actuator.clone(),
        peripheral.clone(),
        log::discard(),
    )
    .await
    .unwrap();
    let thresholds = core.thresholds();
    let central = peripheral.central("phone");

    let scenario = async {
        let mut link = central.connect().await.unwrap();
        assert_eq!(next_on(&mut link, THRESHOLD_CHAR).await.value, vec![30, 200]);

        // readings from a half-filled window may be off, wait for the steady rate
        let settled = timeout(Duration::from_secs(10), async {
            loop {
                let hr = next_on(&mut link, HEART_RATE_MEASUREMENT).await;
                assert_eq!(hr.value[0], 0x00);
                if hr.value[1] == 60 {
                    break;
                }
            }
        })
        .await;
        assert!(settled.is_ok(), "heart rate never settled at 60");
        assert!(peripheral.value(SPO2_CHAR).is_some());
        assert_eq!(actuator.pulses(), 0);

        // 60 bpm now sits below the lower limit
        link.write(THRESHOLD_CHAR, &[80, 150]).await.unwrap();
        sleep(Duration::from_secs(3)).await;
        assert!(actuator.pulses() >= 1, "buzzer never pulsed");

        link.write(THRESHOLD_CHAR, &[40, 150]).await.unwrap();
        // rejected, limits stay
        link.write(THRESHOLD_CHAR, &[150, 40]).await.unwrap();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(thresholds.snapshot().await, Thresholds::new(40, 150).unwrap());

        // finger lifted from 20 s to 25 s
        sleep_until(start + Duration::from_secs(24)).await;
        assert!(!actuator.level());

        // reconnecting republishes the current limits
        link.disconnect();
        sleep(Duration::from_millis(100)).await;
        let mut link = central.connect().await.unwrap();
        assert_eq!(next_on(&mut link, THRESHOLD_CHAR).await.value, vec![40, 150]);
    };

    core.run(scenario).await;
    assert!(!actuator.level());
}

#[tokio::test(start_paused = true)]
async fn startup_advertises_and_rejects_invalid_config() {
    let peripheral = SimPeripheral::new();
    let actuator = MockActuator::new();
    let config =
        MonitorConfig::from_json_str(r#"{ "sensor": { "led_amplitude": "high" } }"#).unwrap();
    assert_eq!(config.sensor.led_amplitude, LedAmplitude::High);
    assert_eq!(config.sensor.sample_rate, 400);

    let core = PulseWatchCore::new(
        config,
        MockSensor::new(72.0),
        actuator.clone(),
        peripheral.clone(),
        log::discard(),
    )
    .await
    .unwrap();

    // advertising starts with the first poll of the config loop
    core.run(sleep(Duration::from_millis(10))).await;
    let advertisement = peripheral.advertisement().expect("should be advertising");
    assert_eq!(advertisement.name, "PicoW-HR");
    assert_eq!(advertisement.services.len(), 3);
    assert!(!actuator.level());

    let invalid = MonitorConfig {
        engine: pwcore::analysis::Parameters {
            window_size: 1,
            ..Default::default()
        },
        ..MonitorConfig::default()
    };
    let sensor = MockSensor::new(72.0);
    assert!(PulseWatchCore::new(invalid, sensor, actuator, peripheral, log::discard())
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn startup_configures_sensor() {
    let mut sensor = MockSensor::new(72.0);
    let core = PulseWatchCore::new(
        MonitorConfig::default(),
        &mut sensor,
        MockActuator::new(),
        SimPeripheral::new(),
        log::discard(),
    )
    .await
    .unwrap();
    drop(core);

    assert_eq!(
        sensor.settings(),
        Some(&SensorSettings {
            sample_rate: 400,
            fifo_average: 8,
            led_amplitude: LedAmplitude::Medium,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn sensor_setup_failure_is_fatal() {
    let peripheral = SimPeripheral::new();
    let sensor = MockSensor::new(72.0).with_setup_fault(SensorError::NotResponding);

    let result = PulseWatchCore::new(
        MonitorConfig::default(),
        sensor,
        MockActuator::new(),
        peripheral.clone(),
        log::discard(),
    )
    .await;

    assert!(matches!(
        result,
        Err(StartupError::Sensor(SensorError::NotResponding))
    ));
    assert_eq!(peripheral.advertisement(), None);
}
