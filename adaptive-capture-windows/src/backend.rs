//! [`CaptureBackend`] over WASAPI.

use std::sync::Arc;

use parking_lot::Mutex;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::CLSCTX_ALL;

use adaptive_capture_core::models::audio_models::{DeviceRequest, RoutedDevice};
use adaptive_capture_core::models::error::DeviceInitError;
use adaptive_capture_core::traits::capture_backend::CaptureBackend;
use adaptive_capture_core::traits::capture_device::CaptureDevice;

use crate::device_enumerator::DeviceEnumerator;
use crate::wasapi_device::WasapiDevice;

const HNS_PER_SEC: u64 = 10_000_000;

/// WASAPI capture backend.
///
/// Microphone sources map to capture endpoints by role and stream category;
/// playback loopback opens the default render endpoint with
/// `AUDCLNT_STREAMFLAGS_LOOPBACK`. No permissions are needed for loopback.
#[derive(Default)]
pub struct WasapiBackend {
    preferred_input: Arc<Mutex<Option<String>>>,
}

impl WasapiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route future microphone streams to a specific endpoint.
    pub fn set_preferred_input(&self, device_id: Option<String>) {
        *self.preferred_input.lock() = device_id;
    }

    fn default_capture_client(&self) -> Option<IAudioClient> {
        let enumerator = DeviceEnumerator::new().ok()?;
        let device = enumerator.endpoint(eCapture, eConsole, None).ok()?;
        unsafe { device.Activate(CLSCTX_ALL, None).ok() }
    }
}

impl CaptureBackend for WasapiBackend {
    /// One default device period at the requested format.
    fn min_buffer_size(&self, sample_rate: u32, channels: u16) -> Option<usize> {
        let client = self.default_capture_client()?;
        let mut default_period: i64 = 0;
        unsafe {
            client.GetDevicePeriod(Some(&mut default_period), None).ok()?;
        }
        if default_period <= 0 {
            return None;
        }
        let bytes_per_sec = sample_rate as u64 * channels as u64 * 2;
        Some((bytes_per_sec * default_period as u64 / HNS_PER_SEC) as usize)
    }

    fn open(&self, request: &DeviceRequest) -> Result<Box<dyn CaptureDevice>, DeviceInitError> {
        let device = WasapiDevice::open(request, Arc::clone(&self.preferred_input))?;
        Ok(Box::new(device))
    }

    fn advertised_rates(&self) -> Option<Vec<u32>> {
        let enumerator = DeviceEnumerator::new().ok()?;
        let device = enumerator.endpoint(eCapture, eConsole, None).ok()?;
        DeviceEnumerator::mix_rate(&device).map(|rate| vec![rate])
    }

    fn input_devices(&self) -> Vec<RoutedDevice> {
        match DeviceEnumerator::new().and_then(|e| e.list_capture_devices()) {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("Could not enumerate capture devices: {}", e);
                Vec::new()
            }
        }
    }
}
