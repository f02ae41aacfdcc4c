use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::models::status::CaptureStatus;

/// Telemetry sink for capture notifications.
///
/// All methods except the first `on_state_changed` are called from the
/// capture thread. Implementations must return quickly and marshal to a UI
/// thread themselves if needed.
pub trait CaptureDelegate: Send + Sync {
    fn on_state_changed(&self, state: CaptureState);

    /// Input level 0-100, rate-limited by the session.
    fn on_level(&self, level: u8);

    fn on_status(&self, status: &CaptureStatus);

    fn on_error(&self, error: &CaptureError);
}
