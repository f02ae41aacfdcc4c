use std::sync::Arc;
use std::time::Duration;

use crate::models::audio_models::DeviceRequest;
use crate::models::error::{CaptureError, DeviceInitError};
use crate::negotiation::candidates::{Candidate, CandidateSpace};
use crate::negotiation::device_handle::{DeviceHandle, PreparedDevice};
use crate::traits::capture_backend::CaptureBackend;

/// Finds the first candidate the platform accepts.
///
/// Opening is split into [`prepare`](Self::prepare) (construct and
/// initialize, not recording) and [`PreparedDevice::activate`] (start), so a
/// reconfiguration can check that a replacement opens before giving up the
/// device it already has.
pub struct DeviceNegotiator {
    backend: Arc<dyn CaptureBackend>,
    channels: u16,
    buffer_floor: usize,
    read_timeout: Duration,
}

impl DeviceNegotiator {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        channels: u16,
        buffer_floor: usize,
        read_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            channels: channels.max(1),
            buffer_floor,
            read_timeout,
        }
    }

    pub fn backend(&self) -> &Arc<dyn CaptureBackend> {
        &self.backend
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Twice the platform minimum, never below the floor, rounded down to a
    /// whole number of frames.
    pub fn buffer_size(&self, sample_rate: u32) -> usize {
        let size = match self.backend.min_buffer_size(sample_rate, self.channels) {
            Some(min) if min > 0 => (min * 2).max(self.buffer_floor),
            _ => self.buffer_floor,
        };
        let frame_bytes = self.channels as usize * 2;
        (size - size % frame_bytes).max(frame_bytes)
    }

    pub fn request_for(&self, candidate: &Candidate) -> DeviceRequest {
        DeviceRequest {
            source: candidate.source,
            sample_rate: candidate.sample_rate,
            channels: self.channels,
            buffer_size: self.buffer_size(candidate.sample_rate),
            read_timeout: self.read_timeout,
        }
    }

    /// Construct and initialize the device for one candidate.
    pub fn prepare(&self, candidate: Candidate) -> Result<PreparedDevice, DeviceInitError> {
        let request = self.request_for(&candidate);
        let device = self.backend.open(&request)?;
        Ok(PreparedDevice::new(device, candidate, request))
    }

    /// Try candidates in priority order and return the first that starts.
    pub fn open(&self, space: &CandidateSpace) -> Result<DeviceHandle, CaptureError> {
        let mut attempts = 0;
        for candidate in space.candidates() {
            attempts += 1;
            match self.prepare(candidate).and_then(PreparedDevice::activate) {
                Ok(handle) => {
                    log::info!(
                        "Capture device ready: source={} sample_rate={} buffer={} bytes",
                        candidate.source,
                        candidate.sample_rate,
                        handle.buffer_size()
                    );
                    return Ok(handle);
                }
                Err(e) => {
                    log::debug!(
                        "Candidate {} at {} Hz failed: {}",
                        candidate.source,
                        candidate.sample_rate,
                        e
                    );
                }
            }
        }
        log::error!("No working capture device after {} attempts", attempts);
        Err(CaptureError::NoWorkingDevice { attempts })
    }
}
