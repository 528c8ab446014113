use std::time::{Duration, Instant};

mod ringbuffer;

pub use ringbuffer::SliceableRingBuffer;

/// Sliding window of the most recent samples, kept as parallel ring buffers.
///
/// All buffers share one capacity and are written together, so index `i` in
/// any of the slices refers to the same sample. Timestamps are stored as
/// offsets from the first sample seen since the last [`SignalWindow::clear`].
pub struct SignalWindow {
    origin: Option<Instant>,
    offsets: SliceableRingBuffer<Duration>,
    ir: SliceableRingBuffer<u32>,
    red: SliceableRingBuffer<u32>,
    smoothed: SliceableRingBuffer<f64>,
}

impl SignalWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            origin: None,
            offsets: SliceableRingBuffer::new(capacity, Duration::ZERO),
            ir: SliceableRingBuffer::new(capacity, 0),
            red: SliceableRingBuffer::new(capacity, 0),
            smoothed: SliceableRingBuffer::new(capacity, 0.0),
        }
    }

    /// Appends a raw sample. The smoothed value is derived by the caller from
    /// [`SignalWindow::recent_ir`] once the raw value is in place, see
    /// [`SignalWindow::push_smoothed`].
    pub fn push_raw(&mut self, ir: u32, red: u32, now: Instant) {
        let origin = *self.origin.get_or_insert(now);
        self.offsets.write(now.saturating_duration_since(origin));
        self.ir.write(ir);
        self.red.write(red);
    }

    pub fn push_smoothed(&mut self, value: f64) {
        self.smoothed.write(value);
    }

    pub fn len(&self) -> usize {
        self.ir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ir.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ir.capacity()
    }

    pub fn ir(&self) -> &[u32] {
        self.ir.get_slice()
    }

    pub fn red(&self) -> &[u32] {
        self.red.get_slice()
    }

    pub fn smoothed(&self) -> &[f64] {
        self.smoothed.get_slice()
    }

    pub fn recent_ir(&self, len: usize) -> &[u32] {
        self.ir.get_slice_with_len(len)
    }

    /// Absolute timestamp of the sample at `index` within the current window.
    pub fn timestamp(&self, index: usize) -> Option<Instant> {
        let offset = self.offsets.get_slice().get(index)?;
        self.origin.map(|origin| origin + *offset)
    }

    pub fn clear(&mut self) {
        self.origin = None;
        self.offsets.clear();
        self.ir.clear();
        self.red.clear();
        self.smoothed.clear();
    }
}
