//! Scripted capture backend for unit tests.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::audio_models::{AudioSourceKind, DeviceRequest, RoutedDevice};
use crate::models::error::{CaptureError, DeviceInitError};
use crate::models::state::CaptureState;
use crate::models::status::CaptureStatus;
use crate::traits::capture_backend::CaptureBackend;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_device::CaptureDevice;
use crate::traits::recognition_sink::{RecognitionResult, RecognitionSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Open { source: AudioSourceKind, sample_rate: u32 },
    Start { source: AudioSourceKind, sample_rate: u32 },
    Stop { source: AudioSourceKind, sample_rate: u32 },
    Release { source: AudioSourceKind, sample_rate: u32 },
    Prefer { source: AudioSourceKind, sample_rate: u32 },
}

type Predicate = Arc<dyn Fn(AudioSourceKind, u32) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct ScriptedBackend {
    events: Arc<Mutex<Vec<DeviceEvent>>>,
    requests: Arc<Mutex<Vec<DeviceRequest>>>,
    accept: Predicate,
    fail_start: Predicate,
    silent: Predicate,
    min_buffer: Option<usize>,
    routed_rates: Vec<u32>,
    advertised_rates: Option<Vec<u32>>,
    input_devices: Vec<RoutedDevice>,
    fail_read_after: Option<usize>,
    fail_stop: bool,
    fail_release: bool,
    read_delay: Duration,
    read_chunk: Option<usize>,
}

impl ScriptedBackend {
    /// Accepts every candidate and produces a loud square wave.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            accept: Arc::new(|_, _| true),
            fail_start: Arc::new(|_, _| false),
            silent: Arc::new(|_, _| false),
            min_buffer: Some(1024),
            routed_rates: Vec::new(),
            advertised_rates: None,
            input_devices: Vec::new(),
            fail_read_after: None,
            fail_stop: false,
            fail_release: false,
            read_delay: Duration::from_millis(1),
            read_chunk: None,
        }
    }

    pub fn accepting(
        mut self,
        f: impl Fn(AudioSourceKind, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.accept = Arc::new(f);
        self
    }

    pub fn failing_start(
        mut self,
        f: impl Fn(AudioSourceKind, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_start = Arc::new(f);
        self
    }

    pub fn silent_when(
        mut self,
        f: impl Fn(AudioSourceKind, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.silent = Arc::new(f);
        self
    }

    pub fn with_min_buffer(mut self, min_buffer: Option<usize>) -> Self {
        self.min_buffer = min_buffer;
        self
    }

    pub fn with_routed_rates(mut self, rates: Vec<u32>) -> Self {
        self.routed_rates = rates;
        self
    }

    pub fn with_advertised_rates(mut self, rates: Vec<u32>) -> Self {
        self.advertised_rates = Some(rates);
        self
    }

    pub fn with_input_devices(mut self, devices: Vec<RoutedDevice>) -> Self {
        self.input_devices = devices;
        self
    }

    /// Every device fails its read after `reads` successful reads.
    pub fn failing_read_after(mut self, reads: usize) -> Self {
        self.fail_read_after = Some(reads);
        self
    }

    /// Every device reports an error from `stop`, after recording the event.
    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Every device reports an error from `release`, after recording the event.
    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// How long each read blocks before returning data.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Hand out at most `bytes` per read, splitting samples across reads.
    pub fn with_read_chunk(mut self, bytes: usize) -> Self {
        self.read_chunk = Some(bytes);
        self
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, f: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| f(e)).count()
    }

    /// Every open attempt, accepted or not.
    pub fn requests(&self) -> Vec<DeviceRequest> {
        self.requests.lock().clone()
    }
}

impl CaptureBackend for ScriptedBackend {
    fn min_buffer_size(&self, _sample_rate: u32, _channels: u16) -> Option<usize> {
        self.min_buffer
    }

    fn advertised_rates(&self) -> Option<Vec<u32>> {
        self.advertised_rates.clone()
    }

    fn input_devices(&self) -> Vec<RoutedDevice> {
        self.input_devices.clone()
    }

    fn open(&self, request: &DeviceRequest) -> Result<Box<dyn CaptureDevice>, DeviceInitError> {
        self.requests.lock().push(request.clone());
        if !(self.accept)(request.source, request.sample_rate) {
            return Err(DeviceInitError::Rejected {
                kind: request.source,
                sample_rate: request.sample_rate,
                reason: "scripted rejection".into(),
            });
        }
        self.events.lock().push(DeviceEvent::Open {
            source: request.source,
            sample_rate: request.sample_rate,
        });
        Ok(Box::new(ScriptedDevice {
            request: request.clone(),
            events: Arc::clone(&self.events),
            fail_start: (self.fail_start)(request.source, request.sample_rate),
            silent: (self.silent)(request.source, request.sample_rate),
            routed_rates: self.routed_rates.clone(),
            reads_left: self.fail_read_after,
            fail_stop: self.fail_stop,
            fail_release: self.fail_release,
            read_delay: self.read_delay,
            read_chunk: self.read_chunk,
            stream: Vec::new(),
            frame: 0,
        }))
    }
}

struct ScriptedDevice {
    request: DeviceRequest,
    events: Arc<Mutex<Vec<DeviceEvent>>>,
    fail_start: bool,
    silent: bool,
    routed_rates: Vec<u32>,
    reads_left: Option<usize>,
    fail_stop: bool,
    fail_release: bool,
    read_delay: Duration,
    read_chunk: Option<usize>,
    stream: Vec<u8>,
    frame: usize,
}

impl ScriptedDevice {
    fn push(&self, make: fn(AudioSourceKind, u32) -> DeviceEvent) {
        self.events
            .lock()
            .push(make(self.request.source, self.request.sample_rate));
    }

    /// Next sample of the square wave (or silence) for one frame.
    fn next_sample(&mut self) -> i16 {
        let sample = if self.silent {
            0
        } else if (self.frame / 24) % 2 == 0 {
            8000
        } else {
            -8000
        };
        self.frame += 1;
        sample
    }

    fn fill_frames(&mut self, out: &mut [u8]) {
        let frame_bytes = self.request.frame_bytes();
        for frame in out.chunks_exact_mut(frame_bytes) {
            let sample = self.next_sample();
            for ch in frame.chunks_exact_mut(2) {
                ch.copy_from_slice(&sample.to_le_bytes());
            }
        }
    }
}

impl CaptureDevice for ScriptedDevice {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::Device("scripted start failure".into()));
        }
        self.push(|source, sample_rate| DeviceEvent::Start { source, sample_rate });
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        thread::sleep(self.read_delay);
        if let Some(left) = self.reads_left.as_mut() {
            if *left == 0 {
                return Err(CaptureError::ReadFailed("scripted read failure".into()));
            }
            *left -= 1;
        }
        let frame_bytes = self.request.frame_bytes();
        if let Some(chunk) = self.read_chunk {
            let len = chunk.min(buf.len());
            while self.stream.len() < len {
                let mut frame = vec![0u8; frame_bytes];
                self.fill_frames(&mut frame);
                self.stream.extend_from_slice(&frame);
            }
            buf[..len].copy_from_slice(&self.stream[..len]);
            self.stream.drain(..len);
            return Ok(len);
        }
        let len = buf.len() - buf.len() % frame_bytes;
        self.fill_frames(&mut buf[..len]);
        Ok(len)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.push(|source, sample_rate| DeviceEvent::Stop { source, sample_rate });
        if self.fail_stop {
            return Err(CaptureError::Device("scripted stop failure".into()));
        }
        Ok(())
    }

    fn release(self: Box<Self>) -> Result<(), CaptureError> {
        self.push(|source, sample_rate| DeviceEvent::Release { source, sample_rate });
        if self.fail_release {
            return Err(CaptureError::Device("scripted release failure".into()));
        }
        Ok(())
    }

    fn routed_device(&self) -> Option<RoutedDevice> {
        Some(RoutedDevice {
            id: "scripted-0".into(),
            name: "Scripted Mic".into(),
            transport_type: None,
            sample_rates: self.routed_rates.clone(),
        })
    }

    fn set_preferred_device(&mut self, _device: &RoutedDevice) -> Result<(), CaptureError> {
        self.push(|source, sample_rate| DeviceEvent::Prefer { source, sample_rate });
        Ok(())
    }
}

/// Delegate that records every notification.
#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<CaptureState>>,
    pub statuses: Mutex<Vec<CaptureStatus>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub levels: Mutex<Vec<u8>>,
}

impl RecordingDelegate {
    pub fn has_status(&self, f: impl Fn(&CaptureStatus) -> bool) -> bool {
        self.statuses.lock().iter().any(f)
    }
}

impl CaptureDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: CaptureState) {
        self.states.lock().push(state);
    }

    fn on_level(&self, level: u8) {
        self.levels.lock().push(level);
    }

    fn on_status(&self, status: &CaptureStatus) {
        self.statuses.lock().push(status.clone());
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().push(error.clone());
    }
}

/// Sink that keeps everything it is fed.
#[derive(Default)]
pub struct CollectingSink {
    pub bytes: Mutex<Vec<u8>>,
    pub results: Mutex<Vec<RecognitionResult>>,
}

impl CollectingSink {
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }
}

impl RecognitionSink for CollectingSink {
    fn feed(&self, pcm: &[u8]) {
        self.bytes.lock().extend_from_slice(pcm);
    }

    fn on_result(&self, result: &RecognitionResult) {
        self.results.lock().push(result.clone());
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
