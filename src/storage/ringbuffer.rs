/// Fixed-capacity FIFO whose most recent entries are always readable as one
/// contiguous slice. Every write lands twice, once in each half of the backing
/// vector, so no read ever has to stitch two pieces together.
pub struct SliceableRingBuffer<T: Clone> {
    buffer: Vec<T>,
    write_position: usize,
    capacity: usize,
    len: usize,
    default_value: T,
}

impl<T: Clone> SliceableRingBuffer<T> {
    // Initialize a new SliceableRingBuffer with the specified capacity.
    pub fn new(capacity: usize, default_value: T) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        SliceableRingBuffer {
            buffer: vec![default_value.clone(); capacity * 2],
            write_position: 0,
            capacity,
            len: 0,
            default_value,
        }
    }

    // Write data into the buffer, duplicating the write to handle wrapping.
    // Once full, the oldest entry is evicted.
    pub fn write(&mut self, data: T) {
        let adjusted_position = self.write_position % self.capacity;
        self.buffer[adjusted_position] = data.clone();
        self.buffer[adjusted_position + self.capacity] = data;

        self.write_position = (self.write_position + 1) % self.capacity;
        self.len = (self.len + 1).min(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&T> {
        self.get_slice().last()
    }

    /// Every entry currently held, oldest first.
    pub fn get_slice(&self) -> &[T] {
        self.get_slice_with_len(self.len)
    }

    // Returns a slice of the last `len` elements written, clamped to what is held.
    pub fn get_slice_with_len(&self, len: usize) -> &[T] {
        let len = len.min(self.len);
        let start = (self.write_position + (self.capacity - len)) % self.capacity;
        &self.buffer[start..start + len]
    }

    pub fn clear(&mut self) {
        self.buffer.fill(self.default_value.clone());
        self.write_position = 0;
        self.len = 0;
    }
}
