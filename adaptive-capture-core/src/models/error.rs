use thiserror::Error;

use super::audio_models::AudioSourceKind;

/// Errors that end or prevent a capture session.
///
/// A single candidate failing to open is a [`DeviceInitError`]; it only
/// becomes a `CaptureError` once the whole candidate space is exhausted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no working capture device after {attempts} attempts")]
    NoWorkingDevice { attempts: usize },

    #[error("audio read failed: {0}")]
    ReadFailed(String),

    #[error("capture device lost during reconfiguration")]
    DeviceLost,

    #[error("resampler init failed: {0}")]
    ResamplerInit(String),

    #[error("capture already active")]
    AlreadyActive,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Failure of one (source, rate) candidate. Recovered locally by moving on
/// to the next candidate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceInitError {
    #[error("{kind} rejected {sample_rate} Hz: {reason}")]
    Rejected {
        kind: AudioSourceKind,
        sample_rate: u32,
        reason: String,
    },

    #[error("device failed to start: {0}")]
    StartFailed(String),
}
