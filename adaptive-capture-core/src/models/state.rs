use serde::{Deserialize, Serialize};

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → recording ⇄ reconfiguring
///            ↓
///         stopped → (start again) recording
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Recording,
    Reconfiguring,
    Stopped,
}

impl CaptureState {
    /// Recording or in the middle of a live re-negotiation.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Recording | Self::Reconfiguring)
    }

    /// Whether `start` may be called from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Reconfiguring => "reconfiguring",
            Self::Stopped => "stopped",
        }
    }
}
