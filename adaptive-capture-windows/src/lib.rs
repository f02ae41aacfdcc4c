//! # adaptive-capture-windows
//!
//! Windows WASAPI backend for adaptive-capture.
//!
//! Provides:
//! - `WasapiBackend`: `CaptureBackend` for microphone roles and render loopback
//! - `WasapiDevice`: one shared-mode PCM16 stream at a negotiated rate
//! - `DeviceEnumerator`: endpoint enumeration via the MMDevice API
//!
//! ## Source mapping
//! | Source | Endpoint role | Stream category |
//! |---|---|---|
//! | voice_communication | eCommunications | Communications |
//! | mic | eConsole | Other |
//! | camcorder | eMultimedia | Other |
//! | unprocessed | eConsole | Other, raw mode |
//! | voice_recognition | eConsole | Speech |
//! | playback_loopback | eRender (loopback) | n/a |
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use adaptive_capture_core::{AudioCapture, CaptureConfiguration, CapturePipeline, SourcePreference};
//! use adaptive_capture_windows::WasapiBackend;
//!
//! let (mut capture, frames) =
//!     AudioCapture::with_frame_buffer(Arc::new(WasapiBackend::new()), CaptureConfiguration::default())?;
//! capture.start(16_000, SourcePreference::Microphone)?;
//! let chunk = frames.pull(320, capture.config().pull.max_wait());
//! ```

#[cfg(target_os = "windows")]
pub mod backend;
#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_device;

#[cfg(target_os = "windows")]
pub use backend::WasapiBackend;
#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_device::WasapiDevice;
