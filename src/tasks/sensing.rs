use std::sync::Arc;

use slog::{debug, info, o, warn, Logger};
use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::alarm::{Actuator, AlarmController, AlarmState};
use crate::analysis::HeartRateEngine;
use crate::ble::{BleError, GattServer, Reading};
use crate::config::{MonitorConfig, Timing};
use crate::sensor::{Sample, SampleSource, SensorError};
use crate::thresholds::SharedThresholds;

/// Faults the sensing loop recovers from by backing off and retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensingError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error("Failed to publish reading: {0}")]
    Publish(#[from] BleError),
}

/// What the finger-presence gate decided about a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Accepted,
    NoFinger,
}

/// Polls the sensor, estimates HR and SpO2, publishes readings and drives
/// the buzzer.
pub struct SensingTask<S, A> {
    source: S,
    actuator: A,
    engine: HeartRateEngine,
    alarm: AlarmController,
    thresholds: SharedThresholds,
    server: Arc<dyn GattServer>,
    no_finger_threshold: u32,
    timing: Timing,
    finger_present: bool,
    logger: Logger,
}

impl<S: SampleSource, A: Actuator> SensingTask<S, A> {
    pub fn new(
        config: &MonitorConfig,
        source: S,
        actuator: A,
        thresholds: SharedThresholds,
        server: Arc<dyn GattServer>,
        logger: &Logger,
    ) -> Self {
        Self {
            source,
            actuator,
            engine: HeartRateEngine::new(config.engine.clone()),
            alarm: AlarmController::new(),
            thresholds,
            server,
            no_finger_threshold: config.no_finger_threshold,
            timing: config.timing.clone(),
            finger_present: false,
            logger: logger.new(o!("task" => "sensing")),
        }
    }

    pub fn engine(&self) -> &HeartRateEngine {
        &self.engine
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.alarm.state()
    }

    pub async fn run(&mut self) {
        loop {
            if let Err(e) = self.step().await {
                warn!(self.logger, "Sensing fault, backing off"; "error" => %e);
                sleep(self.timing.fault_backoff()).await;
            }
        }
    }

    /// One loop iteration: poll, process at most one sample, then wait.
    pub async fn step(&mut self) -> Result<(), SensingError> {
        self.source.check()?;

        if self.source.available() {
            let sample = Sample {
                timestamp: Instant::now().into_std(),
                ir: self.source.pop_ir(),
                red: self.source.pop_red(),
            };
            if self.handle_sample(sample).await? == Gate::NoFinger {
                sleep(self.timing.no_finger_delay()).await;
                return Ok(());
            }
        }

        self.drive_actuator().await;
        Ok(())
    }

    /// Gates a sample on finger presence, feeds the engine and, once both
    /// estimates are available, publishes them and re-evaluates the alarm.
    pub async fn handle_sample(&mut self, sample: Sample) -> Result<Gate, SensingError> {
        if sample.ir < self.no_finger_threshold {
            if self.finger_present {
                info!(self.logger, "No finger detected");
            }
            debug!(self.logger, "Sample rejected"; "ir" => sample.ir);
            self.finger_present = false;
            // a window spanning the gap would corrupt the beat intervals
            self.engine.reset();
            self.silence();
            return Ok(Gate::NoFinger);
        }
        self.finger_present = true;

        self.engine.add_sample(sample.ir, sample.red, sample.timestamp);

        let (Some(hr), Some(spo2)) = (self.engine.heart_rate(), self.engine.spo2()) else {
            return Ok(Gate::Accepted);
        };
        let bpm = hr as u32;
        info!(self.logger, "Reading"; "hr" => bpm, "spo2" => spo2);

        for reading in [Reading::heart_rate(bpm), Reading::spo2(spo2)] {
            self.server
                .write_local(reading.characteristic(), &reading.payload(), true)
                .await?;
            debug!(self.logger, "Published";
                "kind" => ?reading.kind, "value" => reading.value,
                "taken_at" => reading.taken_at.to_rfc3339());
        }

        let thresholds = self.thresholds.snapshot().await;
        let was_alerting = self.alarm.is_alerting();
        if self.alarm.evaluate(bpm, &thresholds) == AlarmState::Alerting && !was_alerting {
            warn!(self.logger, "ALERT!";
                "hr" => bpm, "min" => thresholds.min_bpm(), "max" => thresholds.max_bpm());
        }
        Ok(Gate::Accepted)
    }

    /// Square wave while alerting, short idle otherwise.
    async fn drive_actuator(&mut self) {
        if self.alarm.is_alerting() {
            let duty = self.timing.duty_cycle();
            self.actuator.set(true);
            sleep(duty.on).await;
            self.actuator.set(false);
            sleep(duty.off).await;
        } else {
            self.actuator.set(false);
            sleep(self.timing.idle_poll()).await;
        }
    }

    /// Forces the alarm silent and the buzzer off.
    pub fn silence(&mut self) {
        self.alarm.force_silent();
        self.actuator.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::gatt::{self, HEART_RATE_MEASUREMENT, SPO2_CHAR};
    use crate::ble::simulated::SimPeripheral;
    use crate::log;
    use crate::mock::MockActuator;
    use crate::thresholds::Thresholds;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedSource {
        script: VecDeque<Result<(u32, u32), SensorError>>,
        ir: Option<u32>,
        red: Option<u32>,
        checks: Vec<Instant>,
    }

    impl ScriptedSource {
        fn new(script: impl IntoIterator<Item = Result<(u32, u32), SensorError>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn check(&mut self) -> Result<(), SensorError> {
            self.checks.push(Instant::now());
            match self.script.pop_front() {
                Some(Ok((ir, red))) => {
                    self.ir = Some(ir);
                    self.red = Some(red);
                    Ok(())
                }
                Some(Err(e)) => Err(e),
                None => Ok(()),
            }
        }

        fn available(&self) -> bool {
            self.ir.is_some() && self.red.is_some()
        }

        fn pop_ir(&mut self) -> u32 {
            self.ir.take().unwrap_or(0)
        }

        fn pop_red(&mut self) -> u32 {
            self.red.take().unwrap_or(0)
        }
    }

    /// Triangle between 60000 and 90000 sampled 20 times per beat.
    fn triangle(i: u64) -> u32 {
        let phase = i % 20;
        let rise = if phase <= 10 { phase } else { 20 - phase };
        60_000 + 3_000 * rise as u32
    }

    struct Harness {
        task: SensingTask<ScriptedSource, MockActuator>,
        actuator: MockActuator,
        peripheral: Arc<SimPeripheral>,
        clock: std::time::Instant,
        // position on the wave, so consecutive beats join up
        index: u64,
    }

    impl Harness {
        async fn new(script: Vec<Result<(u32, u32), SensorError>>) -> Self {
            let peripheral = SimPeripheral::new();
            peripheral.register_services(&gatt::services()).await.unwrap();
            let actuator = MockActuator::new();
            let task = SensingTask::new(
                &MonitorConfig::default(),
                ScriptedSource::new(script),
                actuator.clone(),
                SharedThresholds::new(Thresholds::new(50, 120).unwrap()),
                peripheral.clone(),
                &log::discard(),
            );
            Self {
                task,
                actuator,
                peripheral,
                clock: std::time::Instant::now(),
                index: 0,
            }
        }

        /// Feeds `count` triangle samples at `bpm` with explicit timestamps.
        async fn beat(&mut self, bpm: u64, count: u64) {
            let step = Duration::from_millis(60_000 / bpm / 20);
            for _ in 0..count {
                let ir = triangle(self.index);
                self.index += 1;
                let sample = Sample {
                    timestamp: self.clock,
                    ir,
                    red: ir / 2,
                };
                self.task.handle_sample(sample).await.unwrap();
                self.clock += step;
            }
        }

        async fn lift_finger(&mut self) {
            let sample = Sample {
                timestamp: self.clock,
                ir: 1_000,
                red: 800,
            };
            assert_eq!(self.task.handle_sample(sample).await.unwrap(), Gate::NoFinger);
            self.clock += Duration::from_secs(5);
            self.index = 0;
        }
    }

    #[tokio::test]
    async fn uncovered_sensor_never_publishes() {
        let mut h = Harness::new(vec![]).await;
        for _ in 0..100 {
            h.lift_finger().await;
        }
        assert!(h.task.engine().is_empty());
        assert_eq!(h.task.alarm_state(), AlarmState::Silent);
        assert_eq!(h.peripheral.value(HEART_RATE_MEASUREMENT), None);
        assert_eq!(h.peripheral.value(SPO2_CHAR), None);
        assert!(h.actuator.history().iter().all(|level| !level));
    }

    #[tokio::test]
    async fn publishes_readings_and_alarms() {
        let mut h = Harness::new(vec![]).await;

        h.beat(150, 50).await;
        assert_eq!(h.peripheral.value(HEART_RATE_MEASUREMENT), Some(vec![0x00, 150]));
        assert_eq!(h.peripheral.value(SPO2_CHAR), Some(vec![85]));
        assert_eq!(h.task.alarm_state(), AlarmState::Alerting);

        h.beat(75, 60).await;
        assert_eq!(h.peripheral.value(HEART_RATE_MEASUREMENT), Some(vec![0x00, 75]));
        assert_eq!(h.task.alarm_state(), AlarmState::Silent);

        h.beat(150, 50).await;
        assert_eq!(h.task.alarm_state(), AlarmState::Alerting);
        h.lift_finger().await;
        assert_eq!(h.task.alarm_state(), AlarmState::Silent);
        assert!(!h.actuator.level());
    }

    #[tokio::test]
    async fn finger_gap_restarts_window() {
        let mut h = Harness::new(vec![]).await;
        h.beat(60, 50).await;
        h.lift_finger().await;
        assert!(h.task.engine().is_empty());

        let replaced_at = h.clock;
        h.beat(75, 50).await;

        let peaks = h.task.engine().find_peaks();
        assert!(peaks.len() >= 2);
        assert!(peaks.iter().all(|p| p.timestamp >= replaced_at));
        assert_eq!(h.peripheral.value(HEART_RATE_MEASUREMENT), Some(vec![0x00, 75]));
    }

    #[tokio::test]
    async fn threshold_changes_apply_to_next_reading() {
        let mut h = Harness::new(vec![]).await;
        h.beat(75, 50).await;
        assert_eq!(h.task.alarm_state(), AlarmState::Silent);

        h.task
            .thresholds
            .replace(Thresholds::new(80, 140).unwrap())
            .await;
        h.beat(75, 1).await;
        assert_eq!(h.task.alarm_state(), AlarmState::Alerting);
    }

    #[tokio::test(start_paused = true)]
    async fn duty_cycle_while_alerting() {
        let mut h = Harness::new(vec![]).await;
        h.beat(150, 50).await;
        let before = h.actuator.history().len();

        let start = Instant::now();
        h.task.step().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(400));
        assert_eq!(&h.actuator.history()[before..], &[true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_poll_while_silent() {
        let mut h = Harness::new(vec![]).await;

        let start = Instant::now();
        h.task.step().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert_eq!(h.actuator.history(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_finger_waits_longer() {
        let mut h = Harness::new(vec![Ok((1_000, 900))]).await;

        let start = Instant::now();
        h.task.step().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(h.actuator.history(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn sensor_fault_is_reported_then_recovers() {
        let mut h = Harness::new(vec![
            Err(SensorError::Bus("nack".to_string())),
            Ok((80_000, 40_000)),
        ])
        .await;

        assert_eq!(
            h.task.step().await,
            Err(SensingError::Sensor(SensorError::Bus("nack".to_string())))
        );
        h.task.step().await.unwrap();
        assert_eq!(h.task.engine().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_backs_off_after_fault() {
        let mut h = Harness::new(vec![
            Err(SensorError::NotResponding),
            Ok((80_000, 40_000)),
        ])
        .await;

        let _ = tokio::time::timeout(Duration::from_millis(1020), h.task.run()).await;

        let checks = &h.task.source.checks;
        assert!(checks.len() >= 2);
        assert_eq!(checks[1] - checks[0], Duration::from_millis(1000));
        assert_eq!(h.task.engine().len(), 1);
    }
}
