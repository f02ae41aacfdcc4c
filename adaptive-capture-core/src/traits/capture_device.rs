use crate::models::audio_models::RoutedDevice;
use crate::models::error::CaptureError;

/// One opened capture stream producing interleaved little-endian PCM16.
///
/// A device is owned by exactly one thread at a time (the capture thread once
/// recording starts). `release` consumes the device, so it runs at most once.
pub trait CaptureDevice: Send {
    /// Begin recording. Called once, after a successful open.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Blocking read of up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` when nothing arrived within the request's read
    /// timeout. An `Err` is a read failure and ends the session.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;

    /// Stop recording. Must tolerate being called on a device that never
    /// started.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Free the underlying platform handle.
    fn release(self: Box<Self>) -> Result<(), CaptureError>;

    /// The physical device the stream ended up on, when the platform says.
    fn routed_device(&self) -> Option<RoutedDevice> {
        None
    }

    /// Ask the platform to route this stream to `device`.
    fn set_preferred_device(&mut self, _device: &RoutedDevice) -> Result<(), CaptureError> {
        Ok(())
    }
}
