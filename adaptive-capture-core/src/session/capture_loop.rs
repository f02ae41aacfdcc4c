use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioSourceKind, SessionDiagnostics};
use crate::models::config::{CaptureConfiguration, SilenceAction};
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::models::status::CaptureStatus;
use crate::negotiation::device_handle::DeviceHandle;
use crate::processing::level::{level_percent, RateLimiter};
use crate::processing::pcm;
use crate::processing::resampler::StreamResampler;
use crate::session::reconfigure::{Reconfiguration, ReconfigurationController};
use crate::session::silence::{SilenceMonitor, SilenceVerdict};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::recognition_sink::RecognitionSink;

/// State shared between the pipeline handle and its capture thread.
pub(crate) struct SessionShared {
    pub running: AtomicBool,
    pub output_rate: AtomicU32,
    pub device_rate: AtomicU32,
    state: Mutex<CaptureState>,
    source: Mutex<Option<AudioSourceKind>>,
    diagnostics: Mutex<SessionDiagnostics>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl SessionShared {
    pub fn new(delegate: Option<Arc<dyn CaptureDelegate>>) -> Self {
        Self {
            running: AtomicBool::new(false),
            output_rate: AtomicU32::new(0),
            device_rate: AtomicU32::new(0),
            state: Mutex::new(CaptureState::Idle),
            source: Mutex::new(None),
            diagnostics: Mutex::new(SessionDiagnostics::default()),
            delegate,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    /// Update the state and notify the delegate if it changed.
    pub fn set_state(&self, new_state: CaptureState) {
        {
            let mut state = self.state.lock();
            if *state == new_state {
                return;
            }
            *state = new_state;
        }
        log::debug!("Capture state: {}", new_state.label());
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(new_state);
        }
    }

    pub fn status(&self, status: &CaptureStatus) {
        log::info!("{}", status);
        if let Some(ref delegate) = self.delegate {
            delegate.on_status(status);
        }
    }

    pub fn level(&self, level: u8) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_level(level);
        }
    }

    /// End the session from the capture thread.
    pub fn fail(&self, error: CaptureError) {
        self.running.store(false, Ordering::SeqCst);
        self.set_state(CaptureState::Stopped);
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
    }

    pub fn source(&self) -> Option<AudioSourceKind> {
        *self.source.lock()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.diagnostics.lock().clone()
    }

    fn update_diagnostics(&self, f: impl FnOnce(&mut SessionDiagnostics)) {
        f(&mut self.diagnostics.lock());
    }
}

/// Resampler from the device rate to the requested rate, or `None` for
/// passthrough. Returns the rate the pipeline will deliver.
pub(crate) fn build_resampler(
    device_rate: u32,
    requested_rate: u32,
    shared: &SessionShared,
) -> (Option<StreamResampler>, u32) {
    if device_rate == requested_rate {
        return (None, device_rate);
    }
    match StreamResampler::new(device_rate, requested_rate) {
        Ok(resampler) => {
            shared.status(&CaptureStatus::Resampling {
                from: resampler.in_rate(),
                to: resampler.out_rate(),
            });
            let output_rate = resampler.out_rate();
            (Some(resampler), output_rate)
        }
        Err(e) => {
            log::warn!("{}; passing device rate through", e);
            shared.status(&CaptureStatus::ResamplerUnavailable { device_rate });
            (None, device_rate)
        }
    }
}

/// Owns the active device on the capture thread and runs the
/// read → meter → silence check → resample → deliver cycle.
pub(crate) struct CaptureWorker {
    device: Option<DeviceHandle>,
    controller: ReconfigurationController,
    resampler: Option<StreamResampler>,
    /// Bytes of an incomplete frame left over from the previous read.
    partial: Vec<u8>,
    requested_rate: u32,
    prefer_built_in_mic: bool,
    silence: SilenceMonitor,
    level_report: RateLimiter,
    level_log: RateLimiter,
    sink: Arc<dyn RecognitionSink>,
    shared: Arc<SessionShared>,
}

impl CaptureWorker {
    pub fn new(
        device: DeviceHandle,
        controller: ReconfigurationController,
        requested_rate: u32,
        config: &CaptureConfiguration,
        sink: Arc<dyn RecognitionSink>,
        shared: Arc<SessionShared>,
    ) -> Self {
        let loopback = device.source().is_loopback();
        let mut worker = Self {
            device: None,
            controller,
            resampler: None,
            partial: Vec::new(),
            requested_rate,
            prefer_built_in_mic: config.prefer_built_in_mic,
            silence: SilenceMonitor::new(config.silence_policy(loopback)),
            level_report: RateLimiter::new(config.level_report_interval()),
            level_log: RateLimiter::new(config.level_log_interval()),
            sink,
            shared,
        };
        worker.install(device);
        worker
    }

    /// Make `device` the active one: pick the resampler and publish rates.
    fn install(&mut self, mut device: DeviceHandle) {
        let device_rate = device.sample_rate();
        let (resampler, output_rate) =
            build_resampler(device_rate, self.requested_rate, &self.shared);
        self.resampler = resampler;
        self.partial.clear();
        self.shared.device_rate.store(device_rate, Ordering::SeqCst);
        self.shared.output_rate.store(output_rate, Ordering::SeqCst);
        *self.shared.source.lock() = Some(device.source());

        if !device.source().is_loopback() {
            if self.prefer_built_in_mic {
                self.route_to_built_in(&mut device);
            }
            if let Some(routed) = device.routed_device() {
                self.shared.status(&CaptureStatus::RoutedTo(routed));
            }
        }
        self.device = Some(device);
    }

    fn route_to_built_in(&self, device: &mut DeviceHandle) {
        let backend = self.controller.negotiator().backend();
        let Some(built_in) = backend.input_devices().into_iter().find(|d| d.is_built_in()) else {
            return;
        };
        match device.set_preferred_device(&built_in) {
            Ok(()) => log::debug!("Preferred device set to {}", built_in),
            Err(e) => log::warn!("Could not route to built-in mic {}: {}", built_in, e),
        }
    }

    pub fn run(mut self) {
        log::info!("Capture loop started");
        let mut buffer = vec![0u8; self.buffer_size()];

        while self.shared.is_running() {
            if self.controller.take_pending() {
                log::info!("Manual reconfiguration requested");
                if !self.reconfigure() {
                    break;
                }
                buffer.resize(self.buffer_size(), 0);
                continue;
            }

            let Some(device) = self.device.as_mut() else {
                break;
            };
            let read = match device.read(&mut buffer) {
                Ok(n) => n,
                Err(e) => {
                    log::error!("Audio read failed: {}", e);
                    let error = match e {
                        CaptureError::ReadFailed(_) | CaptureError::DeviceLost => e,
                        other => CaptureError::ReadFailed(other.to_string()),
                    };
                    self.shared.fail(error);
                    break;
                }
            };
            if read == 0 {
                self.shared.update_diagnostics(|d| d.read_timeouts += 1);
                continue;
            }

            let channels = device.channels() as usize;
            let frame_bytes = channels * 2;
            let read = read.min(buffer.len());
            self.shared.update_diagnostics(|d| {
                d.frames_read += 1;
                d.bytes_captured += read as u64;
            });

            self.partial.extend_from_slice(&buffer[..read]);
            let usable = self.partial.len() / frame_bytes * frame_bytes;
            if usable == 0 {
                continue;
            }
            let samples = pcm::bytes_to_samples(&self.partial[..usable]);
            self.partial.drain(..usable);
            let mono = pcm::downmix_to_mono(&samples, channels);

            let now = Instant::now();
            let level = level_percent(&mono);
            self.report_level(level, now);

            if self.silence.observe(level, now) == SilenceVerdict::Triggered {
                self.shared.update_diagnostics(|d| d.silent_episodes += 1);
                let policy = *self.silence.policy();
                match policy.action {
                    SilenceAction::Reconfigure => {
                        log::warn!(
                            "No signal for {} ms, reconfiguring capture",
                            policy.window_ms
                        );
                        if !self.reconfigure() {
                            break;
                        }
                        buffer.resize(self.buffer_size(), 0);
                        continue;
                    }
                    SilenceAction::Report => {
                        self.shared.status(&CaptureStatus::SilenceDetected {
                            window: policy.window(),
                        });
                    }
                }
            }

            let output = match self.resampler.as_mut() {
                Some(resampler) => resampler.process(&mono),
                None => mono,
            };
            if output.is_empty() {
                continue;
            }
            let bytes = pcm::samples_to_bytes(&output);
            self.sink.feed(&bytes);
            self.shared
                .update_diagnostics(|d| d.bytes_delivered += bytes.len() as u64);
        }

        if let Some(mut device) = self.device.take() {
            device.close();
        }
        log::info!("Capture loop exited");
    }

    fn buffer_size(&self) -> usize {
        self.device.as_ref().map_or(0, |d| d.buffer_size())
    }

    fn report_level(&mut self, level: u8, now: Instant) {
        if self.level_report.ready(now) {
            self.shared.level(level);
        }
        if self.level_log.ready(now) {
            log::info!("level={}", level);
        }
    }

    /// Run one reconfiguration pass. Returns false when the loop must end.
    fn reconfigure(&mut self) -> bool {
        let Some(current) = self.device.take() else {
            return false;
        };
        self.shared.set_state(CaptureState::Reconfiguring);

        let shared = Arc::clone(&self.shared);
        let outcome = self.controller.reconfigure(current, &self.shared.running, |candidate| {
            shared.status(&CaptureStatus::Reconfiguring {
                source: candidate.source,
                sample_rate: candidate.sample_rate,
            });
        });

        let alive = match outcome {
            Reconfiguration::Switched(handle) => {
                self.shared.update_diagnostics(|d| d.reconfigurations += 1);
                self.shared.status(&CaptureStatus::Reconfigured {
                    source: handle.source(),
                    sample_rate: handle.sample_rate(),
                });
                self.install(handle);
                true
            }
            Reconfiguration::Exhausted(handle) => {
                if self.shared.is_running() {
                    self.shared
                        .update_diagnostics(|d| d.reconfigurations_exhausted += 1);
                    self.shared.status(&CaptureStatus::ReconfigurationExhausted);
                }
                self.device = Some(handle);
                true
            }
            Reconfiguration::Skipped(handle) => {
                self.device = Some(handle);
                true
            }
            Reconfiguration::Lost => {
                if self.shared.is_running() {
                    self.shared.status(&CaptureStatus::DeviceLost);
                    self.shared.fail(CaptureError::DeviceLost);
                }
                false
            }
        };

        self.silence.reset();
        self.level_report.reset();
        self.level_log.reset();
        if alive && self.shared.is_running() {
            self.shared.set_state(CaptureState::Recording);
        }
        alive
    }
}
