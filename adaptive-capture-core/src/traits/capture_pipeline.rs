use crate::models::audio_models::SourcePreference;
use crate::models::error::CaptureError;
use crate::models::session_summary::SessionSummary;
use crate::models::state::CaptureState;

/// Caller-facing contract of a capture pipeline.
pub trait CapturePipeline: Send {
    /// Negotiate a device and start the capture thread.
    /// Transitions: idle/stopped → recording.
    fn start(
        &mut self,
        requested_sample_rate: u32,
        preference: SourcePreference,
    ) -> Result<(), CaptureError>;

    /// Stop capture and release the device. Returns `None` when nothing was
    /// running.
    fn stop(&mut self) -> Option<SessionSummary>;

    fn is_active(&self) -> bool;

    /// Rate of the PCM handed downstream: the requested rate while
    /// resampling, the negotiated device rate otherwise.
    fn current_output_sample_rate(&self) -> u32;

    fn state(&self) -> CaptureState;
}
