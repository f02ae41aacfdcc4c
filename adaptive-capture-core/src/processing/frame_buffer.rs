use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::config::PullPolicy;
use crate::processing::ring_buffer::FrameRingBuffer;
use crate::traits::recognition_sink::{RecognitionResult, RecognitionSink};

/// Lock-protected [`FrameRingBuffer`] shared between the capture thread
/// (writer) and the recognition client (reader).
///
/// Wrap in `Arc` to share. Writes never block beyond the lock; reads never
/// block at all, and `pull` waits at most the given timeout.
#[derive(Debug)]
pub struct SharedFrameBuffer {
    ring: Mutex<FrameRingBuffer>,
    data_ready: Condvar,
    pad_bytes: usize,
}

impl SharedFrameBuffer {
    pub fn new(capacity: usize, pad_bytes: usize) -> Self {
        Self {
            ring: Mutex::new(FrameRingBuffer::new(capacity)),
            data_ready: Condvar::new(),
            pad_bytes,
        }
    }

    pub fn with_policy(capacity: usize, policy: &PullPolicy) -> Self {
        Self::new(capacity, policy.pad_bytes)
    }

    /// Append PCM, overwriting the oldest bytes when full.
    pub fn write(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.ring.lock().write(bytes);
        self.data_ready.notify_one();
    }

    /// Non-blocking read of whatever is buffered, up to `max_len` bytes.
    pub fn read(&self, max_len: usize) -> Vec<u8> {
        self.ring.lock().read(max_len)
    }

    /// Consumer-side read with a bounded wait.
    ///
    /// Collects up to `max_len` bytes, waiting at most `timeout` for more to
    /// arrive. If nothing arrived at all, returns `min(max_len, pad_bytes)`
    /// zero bytes instead of an empty result, so a fixed-frame downstream
    /// protocol keeps getting fed during an underrun.
    pub fn pull(&self, max_len: usize, timeout: Duration) -> Vec<u8> {
        let mut out = Vec::with_capacity(max_len);
        if max_len == 0 {
            return out;
        }

        let deadline = Instant::now() + timeout;
        {
            let mut ring = self.ring.lock();
            loop {
                let want = max_len - out.len();
                ring.read_into(want, &mut out);
                if out.len() >= max_len {
                    break;
                }
                if self.data_ready.wait_until(&mut ring, deadline).timed_out() {
                    let want = max_len - out.len();
                    ring.read_into(want, &mut out);
                    break;
                }
            }
        }

        if out.is_empty() {
            log::trace!("frame buffer underrun, padding {} bytes", self.pad_bytes);
            out.resize(max_len.min(self.pad_bytes), 0);
        }
        out
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.ring.lock().size()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Drop everything buffered, e.g. before a new session starts.
    pub fn clear(&self) {
        self.ring.lock().reset();
    }
}

impl RecognitionSink for SharedFrameBuffer {
    fn feed(&self, pcm: &[u8]) {
        self.write(pcm);
    }

    fn on_result(&self, result: &RecognitionResult) {
        match result {
            RecognitionResult::Transcription(text) => log::info!("Transcription: {}", text),
            RecognitionResult::Translation(text) => log::info!("Translation: {}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn pull_on_empty_buffer_pads_after_timeout() {
        let buffer = SharedFrameBuffer::new(1024, 320);

        let started = Instant::now();
        let data = buffer.pull(320, Duration::from_millis(100));

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(data, vec![0u8; 320]);
    }

    #[test]
    fn padding_never_exceeds_request() {
        let buffer = SharedFrameBuffer::new(1024, 320);
        let data = buffer.pull(64, Duration::from_millis(5));
        assert_eq!(data, vec![0u8; 64]);
    }

    #[test]
    fn pull_returns_immediately_when_enough_is_buffered() {
        let buffer = SharedFrameBuffer::new(1024, 320);
        buffer.write(&[1, 2, 3, 4, 5, 6]);

        let started = Instant::now();
        let data = buffer.pull(4, Duration::from_secs(5));

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(data, vec![1, 2, 3, 4]);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn pull_returns_partial_data_without_padding() {
        let buffer = SharedFrameBuffer::new(1024, 320);
        buffer.write(&[7, 7]);

        let data = buffer.pull(320, Duration::from_millis(20));

        assert_eq!(data, vec![7, 7]);
    }

    #[test]
    fn pull_wakes_up_for_late_writer() {
        let buffer = Arc::new(SharedFrameBuffer::new(1024, 320));
        let writer = Arc::clone(&buffer);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.feed(&[9; 8]);
        });

        let data = buffer.pull(8, Duration::from_secs(2));
        handle.join().unwrap();

        assert_eq!(data, vec![9; 8]);
    }

    #[test]
    fn read_is_non_blocking() {
        let buffer = SharedFrameBuffer::new(16, 320);
        assert!(buffer.read(8).is_empty());
    }

    #[test]
    fn results_do_not_touch_buffered_audio() {
        let buffer = SharedFrameBuffer::new(16, 320);
        buffer.write(&[1, 2]);

        let sink: &dyn RecognitionSink = &buffer;
        sink.on_result(&RecognitionResult::Transcription("hello".into()));
        sink.on_result(&RecognitionResult::Translation("hallo".into()));

        assert_eq!(buffer.read(16), vec![1, 2]);
    }

    #[test]
    fn clear_discards_buffered_bytes() {
        let buffer = SharedFrameBuffer::new(16, 320);
        buffer.write(&[1, 2, 3]);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
