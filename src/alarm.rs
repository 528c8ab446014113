//! Out-of-range alarm: a two-state machine plus the on/off timing used to
//! pulse the buzzer while it is alerting.

use std::time::Duration;

use crate::thresholds::Thresholds;

/// Something that can be switched on and off, e.g. a buzzer on a GPIO pin.
pub trait Actuator {
    fn set(&mut self, level: bool);
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set(&mut self, level: bool) {
        (**self).set(level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmState {
    #[default]
    Silent,
    Alerting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    pub on: Duration,
    pub off: Duration,
}

impl Default for DutyCycle {
    fn default() -> Self {
        Self {
            on: Duration::from_millis(200),
            off: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Default)]
pub struct AlarmController {
    state: AlarmState,
}

impl AlarmController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_alerting(&self) -> bool {
        self.state == AlarmState::Alerting
    }

    /// Compares a fresh heart rate against the limits and moves to the
    /// matching state. Returns the new state.
    pub fn evaluate(&mut self, bpm: u32, thresholds: &Thresholds) -> AlarmState {
        self.state = if thresholds.contains(bpm) {
            AlarmState::Silent
        } else {
            AlarmState::Alerting
        };
        self.state
    }

    /// No finger on the sensor: nothing to alert about.
    pub fn force_silent(&mut self) {
        self.state = AlarmState::Silent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_silent() {
        assert_eq!(AlarmController::new().state(), AlarmState::Silent);
    }

    #[test]
    fn alert_then_recover_then_forced_silent() {
        let thresholds = Thresholds::new(50, 120).unwrap();
        let mut alarm = AlarmController::new();

        assert_eq!(alarm.evaluate(130, &thresholds), AlarmState::Alerting);
        assert_eq!(alarm.evaluate(90, &thresholds), AlarmState::Silent);

        assert_eq!(alarm.evaluate(40, &thresholds), AlarmState::Alerting);
        alarm.force_silent();
        assert_eq!(alarm.state(), AlarmState::Silent);
    }

    #[test]
    fn limits_are_inclusive() {
        let thresholds = Thresholds::new(50, 120).unwrap();
        let mut alarm = AlarmController::new();
        assert_eq!(alarm.evaluate(50, &thresholds), AlarmState::Silent);
        assert_eq!(alarm.evaluate(120, &thresholds), AlarmState::Silent);
        assert_eq!(alarm.evaluate(49, &thresholds), AlarmState::Alerting);
        // stays alerting while out of range
        assert_eq!(alarm.evaluate(121, &thresholds), AlarmState::Alerting);
    }
}
