//! Simulated hardware: a pulse oximeter producing a synthetic PPG waveform and
//! a buzzer that records what it was told to do.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::alarm::Actuator;
use crate::sensor::{SampleSource, SensorError, SensorSettings};

/// Synthetic pulse oximeter.
///
/// Every `check` produces one reading pair for the elapsed time since the
/// sensor was created: a pulse at `bpm` riding on a DC level, with a little
/// noise. Finger-off periods and transient faults can be scripted.
pub struct MockSensor {
    started: Instant,
    bpm: f64,
    ir_dc: f64,
    ir_ac: f64,
    red_dc: f64,
    red_ac: f64,
    noise: f64,
    finger_off: Vec<Range<Duration>>,
    faults: VecDeque<SensorError>,
    setup_fault: Option<SensorError>,
    ir_fifo: VecDeque<u32>,
    red_fifo: VecDeque<u32>,
    settings: Option<SensorSettings>,
}

impl MockSensor {
    pub fn new(bpm: f64) -> Self {
        Self {
            started: Instant::now(),
            bpm,
            ir_dc: 75_000.0,
            ir_ac: 15_000.0,
            red_dc: 40_000.0,
            red_ac: 4_000.0,
            noise: 100.0,
            finger_off: Vec::new(),
            faults: VecDeque::new(),
            setup_fault: None,
            ir_fifo: VecDeque::new(),
            red_fifo: VecDeque::new(),
            settings: None,
        }
    }

    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude;
        self
    }

    /// Finger lifted off the sensor for `period`, measured from creation.
    pub fn with_finger_off(mut self, period: Range<Duration>) -> Self {
        self.finger_off.push(period);
        self
    }

    /// Next `check` calls fail with these errors, in order.
    pub fn with_faults(mut self, faults: impl IntoIterator<Item = SensorError>) -> Self {
        self.faults.extend(faults);
        self
    }

    /// `configure` fails with this error, as a sensor missing from the bus would.
    pub fn with_setup_fault(mut self, fault: SensorError) -> Self {
        self.setup_fault = Some(fault);
        self
    }

    /// Settings applied by the last successful `configure`.
    pub fn settings(&self) -> Option<&SensorSettings> {
        self.settings.as_ref()
    }

    fn generate(&self, elapsed: Duration) -> (u32, u32) {
        if self.finger_off.iter().any(|p| p.contains(&elapsed)) {
            // ambient light only
            return (2_000, 1_500);
        }

        let t = elapsed.as_secs_f64();
        let pulse = pulse_shape((t * self.bpm / 60.0).fract());
        let noise = if self.noise > 0.0 {
            rand::random::<f64>() * 2.0 * self.noise - self.noise
        } else {
            0.0
        };

        let ir = self.ir_dc + self.ir_ac * pulse + noise;
        let red = self.red_dc + self.red_ac * pulse + noise;
        (
            ir.clamp(0.0, u32::MAX as f64) as u32,
            red.clamp(0.0, u32::MAX as f64) as u32,
        )
    }
}

/// One heartbeat over `phase` in [0, 1): a sharp systolic rise followed by a
/// slower decay, normalised to roughly [-1, 1].
fn pulse_shape(phase: f64) -> f64 {
    if phase < 0.3 {
        -(PI * phase / 0.3).cos()
    } else {
        (PI * (phase - 0.3) / 0.7).cos()
    }
}

impl SampleSource for MockSensor {
    fn configure(&mut self, settings: &SensorSettings) -> Result<(), SensorError> {
        if let Some(fault) = self.setup_fault.clone() {
            return Err(fault);
        }
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn check(&mut self) -> Result<(), SensorError> {
        if let Some(fault) = self.faults.pop_front() {
            return Err(fault);
        }
        let (ir, red) = self.generate(self.started.elapsed());
        self.ir_fifo.push_back(ir);
        self.red_fifo.push_back(red);
        Ok(())
    }

    fn available(&self) -> bool {
        !self.ir_fifo.is_empty() && !self.red_fifo.is_empty()
    }

    fn pop_ir(&mut self) -> u32 {
        self.ir_fifo.pop_front().unwrap_or(0)
    }

    fn pop_red(&mut self) -> u32 {
        self.red_fifo.pop_front().unwrap_or(0)
    }
}

/// Buzzer stand-in. Clones share state, so a test can keep one handle while
/// the monitor owns another.
#[derive(Clone, Default)]
pub struct MockActuator {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl MockActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level set so far, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn level(&self) -> bool {
        self.history().last().copied().unwrap_or(false)
    }

    /// Number of off-to-on transitions, i.e. buzzer pulses.
    pub fn pulses(&self) -> usize {
        let history = self.history();
        let mut previous = false;
        history
            .into_iter()
            .filter(|&level| {
                let rising = level && !previous;
                previous = level;
                rising
            })
            .count()
    }
}

impl Actuator for MockActuator {
    fn set(&mut self, level: bool) {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(level);
    }
}
