use crate::models::audio_models::{AudioSourceKind, DeviceRequest, RoutedDevice};
use crate::models::error::{CaptureError, DeviceInitError};
use crate::negotiation::candidates::Candidate;
use crate::traits::capture_device::CaptureDevice;

/// Stop then release a device, logging failures instead of propagating them.
pub(crate) fn shutdown_device(mut device: Box<dyn CaptureDevice>, candidate: &Candidate) {
    if let Err(e) = device.stop() {
        log::warn!(
            "Failed to stop {} at {} Hz: {}",
            candidate.source,
            candidate.sample_rate,
            e
        );
    }
    if let Err(e) = device.release() {
        log::warn!(
            "Failed to release {} at {} Hz: {}",
            candidate.source,
            candidate.sample_rate,
            e
        );
    }
}

/// A device that opened successfully but has not started recording yet.
///
/// Released on drop unless [`activate`](Self::activate) hands it on.
pub struct PreparedDevice {
    device: Option<Box<dyn CaptureDevice>>,
    candidate: Candidate,
    request: DeviceRequest,
}

impl PreparedDevice {
    pub(crate) fn new(
        device: Box<dyn CaptureDevice>,
        candidate: Candidate,
        request: DeviceRequest,
    ) -> Self {
        Self {
            device: Some(device),
            candidate,
            request,
        }
    }

    pub fn candidate(&self) -> Candidate {
        self.candidate
    }

    /// Start recording. On failure the device is released before returning.
    pub fn activate(mut self) -> Result<DeviceHandle, DeviceInitError> {
        let Some(mut device) = self.device.take() else {
            return Err(DeviceInitError::StartFailed("device already consumed".into()));
        };
        if let Err(e) = device.start() {
            shutdown_device(device, &self.candidate);
            return Err(DeviceInitError::StartFailed(e.to_string()));
        }
        Ok(DeviceHandle {
            device: Some(device),
            candidate: self.candidate,
            request: self.request.clone(),
        })
    }
}

impl Drop for PreparedDevice {
    fn drop(&mut self) {
        if let Some(device) = self.device.take() {
            shutdown_device(device, &self.candidate);
        }
    }
}

/// The active, started capture device plus the candidate it was opened for.
///
/// Owns the device exclusively. [`close`](Self::close) stops and releases it
/// exactly once; dropping an open handle closes it.
pub struct DeviceHandle {
    device: Option<Box<dyn CaptureDevice>>,
    candidate: Candidate,
    request: DeviceRequest,
}

impl DeviceHandle {
    pub fn candidate(&self) -> Candidate {
        self.candidate
    }

    pub fn request(&self) -> &DeviceRequest {
        &self.request
    }

    pub fn source(&self) -> AudioSourceKind {
        self.candidate.source
    }

    pub fn sample_rate(&self) -> u32 {
        self.candidate.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.request.channels
    }

    pub fn buffer_size(&self) -> usize {
        self.request.buffer_size
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Blocking read. A closed handle reports [`CaptureError::DeviceLost`].
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        match self.device.as_mut() {
            Some(device) => device.read(buf),
            None => Err(CaptureError::DeviceLost),
        }
    }

    pub fn routed_device(&self) -> Option<RoutedDevice> {
        self.device.as_ref().and_then(|d| d.routed_device())
    }

    pub fn set_preferred_device(&mut self, target: &RoutedDevice) -> Result<(), CaptureError> {
        match self.device.as_mut() {
            Some(device) => device.set_preferred_device(target),
            None => Err(CaptureError::DeviceLost),
        }
    }

    /// Stop and release the device. Returns false if it was already closed.
    pub fn close(&mut self) -> bool {
        match self.device.take() {
            Some(device) => {
                log::debug!(
                    "Closing {} at {} Hz",
                    self.candidate.source,
                    self.candidate.sample_rate
                );
                shutdown_device(device, &self.candidate);
                true
            }
            None => false,
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DeviceEvent, ScriptedBackend};
    use crate::traits::capture_backend::CaptureBackend;
    use std::time::Duration;

    fn request(source: AudioSourceKind, sample_rate: u32) -> DeviceRequest {
        DeviceRequest {
            source,
            sample_rate,
            channels: 1,
            buffer_size: 1024,
            read_timeout: Duration::from_millis(10),
        }
    }

    fn candidate(source: AudioSourceKind, sample_rate: u32) -> Candidate {
        Candidate {
            source_index: 0,
            rate_index: 0,
            source,
            sample_rate,
        }
    }

    #[test]
    fn close_releases_exactly_once() {
        let backend = ScriptedBackend::new();
        let req = request(AudioSourceKind::Mic, 48000);
        let device = backend.open(&req).unwrap();
        let mut handle = PreparedDevice::new(device, candidate(AudioSourceKind::Mic, 48000), req)
            .activate()
            .unwrap();

        assert!(handle.close());
        assert!(!handle.close());
        drop(handle);

        assert_eq!(backend.count(|e| matches!(e, DeviceEvent::Release { .. })), 1);
        assert!(matches!(
            backend.events().as_slice(),
            [
                DeviceEvent::Open { .. },
                DeviceEvent::Start { .. },
                DeviceEvent::Stop { .. },
                DeviceEvent::Release { .. }
            ]
        ));
    }

    #[test]
    fn dropping_open_handle_releases_device() {
        let backend = ScriptedBackend::new();
        let req = request(AudioSourceKind::Mic, 16000);
        let device = backend.open(&req).unwrap();
        let handle = PreparedDevice::new(device, candidate(AudioSourceKind::Mic, 16000), req)
            .activate()
            .unwrap();
        drop(handle);

        assert_eq!(backend.count(|e| matches!(e, DeviceEvent::Release { .. })), 1);
    }

    #[test]
    fn failed_start_releases_device() {
        let backend = ScriptedBackend::new().failing_start(|source, _| source == AudioSourceKind::Mic);
        let req = request(AudioSourceKind::Mic, 16000);
        let device = backend.open(&req).unwrap();

        let result = PreparedDevice::new(device, candidate(AudioSourceKind::Mic, 16000), req).activate();

        assert!(matches!(result, Err(DeviceInitError::StartFailed(_))));
        assert_eq!(backend.count(|e| matches!(e, DeviceEvent::Release { .. })), 1);
    }

    #[test]
    fn unused_prepared_device_is_released() {
        let backend = ScriptedBackend::new();
        let req = request(AudioSourceKind::Camcorder, 8000);
        let device = backend.open(&req).unwrap();
        drop(PreparedDevice::new(device, candidate(AudioSourceKind::Camcorder, 8000), req));

        assert_eq!(backend.count(|e| matches!(e, DeviceEvent::Start { .. })), 0);
        assert_eq!(backend.count(|e| matches!(e, DeviceEvent::Release { .. })), 1);
    }

    #[test]
    fn closed_handle_reads_as_device_lost() {
        let backend = ScriptedBackend::new();
        let req = request(AudioSourceKind::Mic, 16000);
        let device = backend.open(&req).unwrap();
        let mut handle = PreparedDevice::new(device, candidate(AudioSourceKind::Mic, 16000), req)
            .activate()
            .unwrap();
        handle.close();

        let mut buf = [0u8; 32];
        assert_eq!(handle.read(&mut buf), Err(CaptureError::DeviceLost));
    }

    #[test]
    fn failed_stop_does_not_skip_release() {
        let backend = ScriptedBackend::new().failing_stop();
        let req = request(AudioSourceKind::Mic, 48000);
        let device = backend.open(&req).unwrap();

        shutdown_device(device, &candidate(AudioSourceKind::Mic, 48000));

        assert!(matches!(
            backend.events().as_slice(),
            [
                DeviceEvent::Open { .. },
                DeviceEvent::Stop { .. },
                DeviceEvent::Release { .. }
            ]
        ));
    }

    #[test]
    fn close_survives_failing_stop_and_release() {
        let backend = ScriptedBackend::new().failing_stop().failing_release();
        let req = request(AudioSourceKind::Mic, 16000);
        let device = backend.open(&req).unwrap();
        let mut handle = PreparedDevice::new(device, candidate(AudioSourceKind::Mic, 16000), req)
            .activate()
            .unwrap();

        assert!(handle.close());
        assert!(!handle.is_open());
        assert!(!handle.close());
        assert_eq!(backend.count(|e| matches!(e, DeviceEvent::Release { .. })), 1);
    }
}
