/// Fixed-capacity circular byte buffer for PCM hand-off.
///
/// Not synchronized by itself; [`SharedFrameBuffer`] wraps it in a
/// `parking_lot::Mutex` so cursor updates and the byte copy happen under one
/// lock.
///
/// Overflow behavior: writes never fail, the oldest unread bytes are dropped.
///
/// [`SharedFrameBuffer`]: super::frame_buffer::SharedFrameBuffer
#[derive(Debug)]
pub struct FrameRingBuffer {
    buffer: Vec<u8>,
    write_index: usize,
    read_index: usize,
    size: usize,
}

impl FrameRingBuffer {
    /// A zero capacity is bumped to one byte.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(1)],
            write_index: 0,
            read_index: 0,
            size: 0,
        }
    }

    /// Write bytes into the ring buffer.
    ///
    /// If the buffer overflows, the oldest bytes are dropped.
    /// If `bytes` is larger than capacity, only the last `capacity` bytes are kept.
    pub fn write(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let capacity = self.capacity();

        // If more data than capacity, only keep the tail
        let bytes = if bytes.len() > capacity {
            &bytes[bytes.len() - capacity..]
        } else {
            bytes
        };

        // Drop oldest if we'd overflow
        let overflow = (self.size + bytes.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % capacity;
            self.size -= overflow;
        }

        // Copy in at most two segments around the wrap point
        let first = bytes.len().min(capacity - self.write_index);
        self.buffer[self.write_index..self.write_index + first].copy_from_slice(&bytes[..first]);
        let rest = bytes.len() - first;
        if rest > 0 {
            self.buffer[..rest].copy_from_slice(&bytes[first..]);
        }
        self.write_index = (self.write_index + bytes.len()) % capacity;
        self.size += bytes.len();
    }

    /// Read and remove up to `max_len` bytes into `out`.
    ///
    /// Returns the number of bytes appended.
    pub fn read_into(&mut self, max_len: usize, out: &mut Vec<u8>) -> usize {
        let to_read = max_len.min(self.size);
        if to_read == 0 {
            return 0;
        }
        let capacity = self.capacity();

        let first = to_read.min(capacity - self.read_index);
        out.extend_from_slice(&self.buffer[self.read_index..self.read_index + first]);
        let rest = to_read - first;
        if rest > 0 {
            out.extend_from_slice(&self.buffer[..rest]);
        }
        self.read_index = (self.read_index + to_read) % capacity;
        self.size -= to_read;
        to_read
    }

    /// Read and remove up to `max_len` bytes.
    ///
    /// Returns fewer bytes if fewer are buffered, an empty vec if none are.
    pub fn read(&mut self, max_len: usize) -> Vec<u8> {
        let mut result = Vec::with_capacity(max_len.min(self.size));
        self.read_into(max_len, &mut result);
        result
    }

    /// Number of bytes currently available for reading.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Reset the buffer to empty state.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.size = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}
