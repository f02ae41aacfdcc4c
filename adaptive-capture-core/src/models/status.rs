use std::fmt;
use std::time::Duration;

use super::audio_models::{AudioSourceKind, RoutedDevice};

/// Human-readable status events sent to the telemetry sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    Negotiated {
        source: AudioSourceKind,
        sample_rate: u32,
    },
    Resampling {
        from: u32,
        to: u32,
    },
    /// Resampler could not be built; raw device-rate audio is passed through.
    ResamplerUnavailable {
        device_rate: u32,
    },
    RoutedTo(RoutedDevice),
    SilenceDetected {
        window: Duration,
    },
    Reconfiguring {
        source: AudioSourceKind,
        sample_rate: u32,
    },
    Reconfigured {
        source: AudioSourceKind,
        sample_rate: u32,
    },
    /// No alternative worked; capture continues on the previous path.
    ReconfigurationExhausted,
    DeviceLost,
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negotiated {
                source,
                sample_rate,
            } => write!(f, "capturing from {} at {} Hz", source, sample_rate),
            Self::Resampling { from, to } => write!(f, "resampling {} Hz to {} Hz", from, to),
            Self::ResamplerUnavailable { device_rate } => write!(
                f,
                "resampler unavailable, delivering device rate {} Hz",
                device_rate
            ),
            Self::RoutedTo(device) => write!(f, "routed to {}", device),
            Self::SilenceDetected { window } => write!(
                f,
                "captured only silence for {} ms; recording may be blocked by the system or held by another app",
                window.as_millis()
            ),
            Self::Reconfiguring {
                source,
                sample_rate,
            } => write!(f, "trying {} at {} Hz", source, sample_rate),
            Self::Reconfigured {
                source,
                sample_rate,
            } => write!(f, "switched to {} at {} Hz", source, sample_rate),
            Self::ReconfigurationExhausted => f.write_str(
                "no working input found; check the microphone privacy toggle or whether another app holds the input",
            ),
            Self::DeviceLost => f.write_str("capture device lost"),
        }
    }
}
