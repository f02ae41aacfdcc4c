use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Logical audio-input category a platform may expose as a distinct endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSourceKind {
    /// Tuned for calls (echo cancellation, noise suppression).
    VoiceCommunication,
    Mic,
    Camcorder,
    /// Raw signal, no platform processing.
    Unprocessed,
    VoiceRecognition,
    /// What the system is currently playing.
    PlaybackLoopback,
}

impl AudioSourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::VoiceCommunication => "voice_communication",
            Self::Mic => "mic",
            Self::Camcorder => "camcorder",
            Self::Unprocessed => "unprocessed",
            Self::VoiceRecognition => "voice_recognition",
            Self::PlaybackLoopback => "playback_loopback",
        }
    }

    pub fn is_loopback(&self) -> bool {
        matches!(self, Self::PlaybackLoopback)
    }
}

impl fmt::Display for AudioSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the caller wants to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePreference {
    /// Microphone sources in the fixed priority order.
    Microphone,
    /// Microphone sources, with the given source tried first.
    MicrophoneFirst(AudioSourceKind),
    /// System playback loopback (stereo, downmixed before resampling).
    PlaybackLoopback,
}

impl SourcePreference {
    pub fn is_loopback(&self) -> bool {
        matches!(self, Self::PlaybackLoopback)
    }

    /// Channel count requested from the device.
    pub fn device_channels(&self) -> u16 {
        if self.is_loopback() {
            2
        } else {
            1
        }
    }
}

/// Transport type for an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioTransportType {
    BuiltIn,
    Bluetooth,
    BluetoothLE,
    Usb,
    Virtual,
    Unknown,
}

/// Metadata of the physical device a capture stream is routed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedDevice {
    pub id: String,
    pub name: String,
    pub transport_type: Option<AudioTransportType>,
    /// Sample rates the device advertises. Empty when unknown.
    pub sample_rates: Vec<u32>,
}

impl RoutedDevice {
    pub fn is_built_in(&self) -> bool {
        self.transport_type == Some(AudioTransportType::BuiltIn)
    }
}

impl fmt::Display for RoutedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport_type {
            Some(transport) => write!(f, "{} ({:?})", self.name, transport),
            None => f.write_str(&self.name),
        }
    }
}

/// Parameters handed to a backend when opening one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub source: AudioSourceKind,
    pub sample_rate: u32,
    pub channels: u16,
    /// Device buffer size in bytes.
    pub buffer_size: usize,
    /// Upper bound a single `read` may block for.
    pub read_timeout: Duration,
}

impl DeviceRequest {
    /// Bytes per interleaved 16-bit frame.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * 2
    }
}

/// Per-session counters, mostly for debugging flaky devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    pub frames_read: u64,
    pub bytes_captured: u64,
    pub bytes_delivered: u64,
    pub read_timeouts: u64,
    pub silent_episodes: u64,
    pub reconfigurations: u64,
    pub reconfigurations_exhausted: u64,
}
