//! # adaptive-capture-core
//!
//! Platform-agnostic adaptive audio capture core.
//!
//! Finds a (source, sample rate) pair the platform will actually record
//! from, resamples to the rate a speech recognizer asked for, notices when
//! the chosen input produces only silence and walks on to the next
//! candidate, and buffers the result for a pull-based consumer. Platform
//! backends (Windows WASAPI) implement `CaptureBackend` and plug into the
//! generic `AudioCapture` pipeline.
//!
//! ## Architecture
//!
//! ```text
//! adaptive-capture-core (this crate)
//! ├── traits/       ← CaptureBackend, CaptureDevice, CapturePipeline, CaptureDelegate, RecognitionSink
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, CaptureStatus, SessionSummary
//! ├── negotiation/  ← CandidateSpace, DeviceNegotiator, DeviceHandle
//! ├── processing/   ← StreamResampler, level metering, PCM helpers, FrameRingBuffer, SharedFrameBuffer
//! └── session/      ← AudioCapture, capture loop, SilenceMonitor, ReconfigurationController
//! ```

pub mod models;
pub mod negotiation;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    AudioSourceKind, AudioTransportType, DeviceRequest, RoutedDevice, SessionDiagnostics,
    SourcePreference,
};
pub use models::config::{
    CaptureConfiguration, PullPolicy, SilenceAction, SilencePolicy, DEFAULT_SAMPLE_RATE,
};
pub use models::error::{CaptureError, DeviceInitError};
pub use models::session_summary::SessionSummary;
pub use models::state::CaptureState;
pub use models::status::CaptureStatus;
pub use negotiation::candidates::{Candidate, CandidateSpace};
pub use negotiation::negotiator::DeviceNegotiator;
pub use processing::frame_buffer::SharedFrameBuffer;
pub use processing::resampler::StreamResampler;
pub use processing::ring_buffer::FrameRingBuffer;
pub use session::audio_capture::AudioCapture;
pub use session::silence::{SilenceMonitor, SilenceVerdict};
pub use traits::capture_backend::CaptureBackend;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_device::CaptureDevice;
pub use traits::capture_pipeline::CapturePipeline;
pub use traits::recognition_sink::{RecognitionResult, RecognitionSink};
