//! One WASAPI shared-mode capture stream at a negotiated format.
//!
//! The stream is opened as 16-bit PCM at the candidate's rate and channel
//! count, with `AUTOCONVERTPCM` so the audio engine converts from the mix
//! format. Whether the engine accepts a given (endpoint, category, rate)
//! combination is exactly what negotiation probes for.

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use windows::core::{Interface, PCWSTR};
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Threading::AvSetMmThreadCharacteristicsW;

use adaptive_capture_core::models::audio_models::{AudioSourceKind, DeviceRequest, RoutedDevice};
use adaptive_capture_core::models::error::{CaptureError, DeviceInitError};
use adaptive_capture_core::traits::capture_device::CaptureDevice;

use crate::com::ensure_mta;
use crate::device_enumerator::DeviceEnumerator;

const WAVE_FORMAT_PCM: u16 = 1;
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const HNS_PER_SEC: u64 = 10_000_000;

const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;
const AUDCLNT_E_DEVICE_IN_USE: i32 = 0x8889_000A_u32 as i32;

/// How a source kind maps onto a WASAPI endpoint and stream category.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EndpointProfile {
    pub flow: EDataFlow,
    pub role: ERole,
    pub category: Option<AUDIO_STREAM_CATEGORY>,
    pub raw: bool,
    pub loopback: bool,
}

impl EndpointProfile {
    pub fn for_source(source: AudioSourceKind) -> Self {
        let capture = |role, category, raw| Self {
            flow: eCapture,
            role,
            category: Some(category),
            raw,
            loopback: false,
        };
        match source {
            AudioSourceKind::VoiceCommunication => {
                capture(eCommunications, AudioCategory_Communications, false)
            }
            AudioSourceKind::Mic => capture(eConsole, AudioCategory_Other, false),
            AudioSourceKind::Camcorder => capture(eMultimedia, AudioCategory_Other, false),
            AudioSourceKind::Unprocessed => capture(eConsole, AudioCategory_Other, true),
            AudioSourceKind::VoiceRecognition => capture(eConsole, AudioCategory_Speech, false),
            AudioSourceKind::PlaybackLoopback => Self {
                flow: eRender,
                role: eConsole,
                category: None,
                raw: false,
                loopback: true,
            },
        }
    }
}

/// A started-or-startable WASAPI capture stream.
pub struct WasapiDevice {
    request: DeviceRequest,
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    routed: Option<RoutedDevice>,
    preferred_input: Arc<Mutex<Option<String>>>,
    pending: Vec<u8>,
    started: bool,
    mmcss_thread: Option<ThreadId>,
}

// SAFETY: the COM objects live in the multithreaded apartment and every
// thread that calls into them joins it first (see `com::ensure_mta`).
unsafe impl Send for WasapiDevice {}

fn rejected(request: &DeviceRequest, reason: impl Into<String>) -> DeviceInitError {
    DeviceInitError::Rejected {
        kind: request.source,
        sample_rate: request.sample_rate,
        reason: reason.into(),
    }
}

fn describe_hresult(e: &windows::core::Error) -> String {
    match e.code().0 {
        E_ACCESSDENIED => format!("access denied, microphone may be disabled in privacy settings ({})", e),
        AUDCLNT_E_DEVICE_IN_USE => format!("endpoint held exclusively by another app ({})", e),
        _ => e.to_string(),
    }
}

impl WasapiDevice {
    /// Open and initialize a stream for one candidate. Not started.
    pub(crate) fn open(
        request: &DeviceRequest,
        preferred_input: Arc<Mutex<Option<String>>>,
    ) -> Result<Self, DeviceInitError> {
        ensure_mta().map_err(|e| rejected(request, e))?;
        let profile = EndpointProfile::for_source(request.source);

        let enumerator = DeviceEnumerator::new().map_err(|e| rejected(request, e.to_string()))?;
        let preferred = if profile.loopback {
            None
        } else {
            preferred_input.lock().clone()
        };
        let device = enumerator
            .endpoint(profile.flow, profile.role, preferred.as_deref())
            .map_err(|e| rejected(request, e))?;

        unsafe {
            let audio_client: IAudioClient = device
                .Activate(windows::Win32::System::Com::CLSCTX_ALL, None)
                .map_err(|e| rejected(request, format!("Activate failed: {}", describe_hresult(&e))))?;

            if let Some(category) = profile.category {
                apply_stream_properties(&audio_client, category, profile.raw)
                    .map_err(|e| rejected(request, e))?;
            }

            let block_align = request.channels * 2;
            let format = WAVEFORMATEX {
                wFormatTag: WAVE_FORMAT_PCM,
                nChannels: request.channels,
                nSamplesPerSec: request.sample_rate,
                nAvgBytesPerSec: request.sample_rate * block_align as u32,
                nBlockAlign: block_align,
                wBitsPerSample: 16,
                cbSize: 0,
            };

            let bytes_per_sec = request.sample_rate as u64 * block_align as u64;
            let buffer_duration = (request.buffer_size as u64 * HNS_PER_SEC / bytes_per_sec.max(1)) as i64;

            let mut flags = AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY
                | AUDCLNT_STREAMFLAGS_NOPERSIST;
            if profile.loopback {
                flags |= AUDCLNT_STREAMFLAGS_LOOPBACK;
            }

            audio_client
                .Initialize(AUDCLNT_SHAREMODE_SHARED, flags, buffer_duration, 0, &format, None)
                .map_err(|e| {
                    rejected(request, format!("Initialize failed: {}", describe_hresult(&e)))
                })?;

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| rejected(request, format!("GetService failed: {}", e)))?;

            let routed = if profile.loopback {
                None
            } else {
                DeviceEnumerator::describe(&device)
            };

            log::debug!(
                "WASAPI stream initialized: source={} sample_rate={} channels={} buffer={}hns",
                request.source,
                request.sample_rate,
                request.channels,
                buffer_duration
            );

            Ok(Self {
                request: request.clone(),
                audio_client,
                capture_client,
                routed,
                preferred_input,
                pending: Vec::new(),
                started: false,
                mmcss_thread: None,
            })
        }
    }

    /// Give the reading thread real-time scheduling via MMCSS, once per thread.
    fn register_reader_thread(&mut self) {
        let current = thread::current().id();
        if self.mmcss_thread == Some(current) {
            return;
        }
        self.mmcss_thread = Some(current);
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        if let Err(e) = unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) } {
            log::debug!("MMCSS registration failed: {}", e);
        }
    }

    /// Move every packet the engine has ready into `pending`.
    fn drain_packets(&mut self) -> Result<(), CaptureError> {
        let frame_bytes = self.request.frame_bytes();
        unsafe {
            let mut packet_length = self
                .capture_client
                .GetNextPacketSize()
                .map_err(|e| CaptureError::ReadFailed(format!("GetNextPacketSize failed: {}", e)))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                self.capture_client
                    .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                    .map_err(|e| CaptureError::ReadFailed(format!("GetBuffer failed: {}", e)))?;

                let len = num_frames as usize * frame_bytes;
                if len > 0 {
                    if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 || buffer_ptr.is_null() {
                        self.pending.resize(self.pending.len() + len, 0);
                    } else {
                        self.pending
                            .extend_from_slice(std::slice::from_raw_parts(buffer_ptr, len));
                    }
                }

                self.capture_client
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| CaptureError::ReadFailed(format!("ReleaseBuffer failed: {}", e)))?;

                packet_length = self
                    .capture_client
                    .GetNextPacketSize()
                    .map_err(|e| CaptureError::ReadFailed(format!("GetNextPacketSize failed: {}", e)))?;
            }
        }
        Ok(())
    }
}

/// Tag the stream with a category and, for unprocessed capture, raw mode.
unsafe fn apply_stream_properties(
    client: &IAudioClient,
    category: AUDIO_STREAM_CATEGORY,
    raw: bool,
) -> Result<(), String> {
    let client2: IAudioClient2 = match client.cast() {
        Ok(c) => c,
        Err(e) if raw => return Err(format!("IAudioClient2 unavailable: {}", e)),
        Err(_) => return Ok(()),
    };
    let properties = AudioClientProperties {
        cbSize: std::mem::size_of::<AudioClientProperties>() as u32,
        bIsOffload: false.into(),
        eCategory: category,
        Options: if raw {
            AUDCLNT_STREAMOPTIONS_RAW
        } else {
            AUDCLNT_STREAMOPTIONS_NONE
        },
    };
    match client2.SetClientProperties(&properties) {
        Ok(()) => Ok(()),
        Err(e) if raw => Err(format!("raw capture not supported: {}", e)),
        Err(e) => {
            log::debug!("SetClientProperties failed, using defaults: {}", e);
            Ok(())
        }
    }
}

impl CaptureDevice for WasapiDevice {
    fn start(&mut self) -> Result<(), CaptureError> {
        ensure_mta().map_err(CaptureError::Device)?;
        unsafe {
            self.audio_client
                .Start()
                .map_err(|e| CaptureError::Device(format!("IAudioClient::Start failed: {}", describe_hresult(&e))))?;
        }
        self.started = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        ensure_mta().map_err(CaptureError::ReadFailed)?;
        self.register_reader_thread();
        let deadline = Instant::now() + self.request.read_timeout;
        loop {
            if self.pending.is_empty() {
                self.drain_packets()?;
            }
            if !self.pending.is_empty() {
                let frame_bytes = self.request.frame_bytes();
                let n = self.pending.len().min(buf.len() / frame_bytes * frame_bytes);
                buf[..n].copy_from_slice(&self.pending[..n]);
                self.pending.drain(..n);
                return Ok(n);
            }
            if Instant::now() >= deadline {
                return Ok(0);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        ensure_mta().map_err(CaptureError::Device)?;
        unsafe {
            self.audio_client
                .Stop()
                .map_err(|e| CaptureError::Device(format!("IAudioClient::Stop failed: {}", e)))
        }
    }

    fn release(self: Box<Self>) -> Result<(), CaptureError> {
        ensure_mta().map_err(CaptureError::Device)?;
        drop(self);
        Ok(())
    }

    fn routed_device(&self) -> Option<RoutedDevice> {
        self.routed.clone()
    }

    /// WASAPI cannot move an initialized stream, so the preference applies
    /// to every stream opened after this call.
    fn set_preferred_device(&mut self, device: &RoutedDevice) -> Result<(), CaptureError> {
        *self.preferred_input.lock() = Some(device.id.clone());
        if self.routed.as_ref().map(|r| r.id.as_str()) != Some(device.id.as_str()) {
            log::info!("Preferred input {} takes effect from the next stream", device);
        }
        Ok(())
    }
}
