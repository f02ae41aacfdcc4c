use crate::models::audio_models::{DeviceRequest, RoutedDevice};
use crate::models::error::DeviceInitError;
use crate::traits::capture_device::CaptureDevice;

/// Platform capability layer the negotiator searches through.
///
/// Implemented by:
/// - `WasapiBackend` (Windows, microphone roles and render loopback)
/// - scripted backends in tests
pub trait CaptureBackend: Send + Sync {
    /// Platform-reported minimum buffer size in bytes, `None` when unknown.
    fn min_buffer_size(&self, sample_rate: u32, channels: u16) -> Option<usize>;

    /// Construct and initialize a device for one candidate.
    ///
    /// On failure the backend must have released anything it partially
    /// constructed.
    fn open(&self, request: &DeviceRequest) -> Result<Box<dyn CaptureDevice>, DeviceInitError>;

    /// Sample rates the default input advertises, if the platform reports any.
    fn advertised_rates(&self) -> Option<Vec<u32>> {
        None
    }

    /// Input devices available for preferred-device routing.
    fn input_devices(&self) -> Vec<RoutedDevice> {
        Vec::new()
    }
}
