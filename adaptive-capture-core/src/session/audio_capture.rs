use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::audio_models::{AudioSourceKind, SessionDiagnostics, SourcePreference};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::session_summary::SessionSummary;
use crate::models::state::CaptureState;
use crate::models::status::CaptureStatus;
use crate::negotiation::candidates::CandidateSpace;
use crate::negotiation::negotiator::DeviceNegotiator;
use crate::processing::frame_buffer::SharedFrameBuffer;
use crate::session::capture_loop::{CaptureWorker, SessionShared};
use crate::session::reconfigure::{ReconfigurationController, ReconfigurationTrigger};
use crate::traits::capture_backend::CaptureBackend;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_pipeline::CapturePipeline;
use crate::traits::recognition_sink::RecognitionSink;

struct WorkerHandle {
    thread: thread::JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

struct SessionInfo {
    id: Uuid,
    started_at: DateTime<Utc>,
    requested_sample_rate: u32,
}

/// Adaptive capture pipeline.
///
/// Negotiates a working (source, rate) pair on the caller's thread, then
/// hands the device to a dedicated capture thread that meters, watches for
/// silence, resamples to the requested rate, and feeds the sink:
/// ```text
/// [CaptureBackend] → [DeviceHandle] → downmix → level/silence → [StreamResampler] → [RecognitionSink]
///                          ↑                           │
///                          └── ReconfigurationController ┘
/// ```
pub struct AudioCapture {
    backend: Arc<dyn CaptureBackend>,
    config: CaptureConfiguration,
    sink: Arc<dyn RecognitionSink>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    shared: Arc<SessionShared>,
    trigger: Option<ReconfigurationTrigger>,
    worker: Option<WorkerHandle>,
    session: Option<SessionInfo>,
}

impl AudioCapture {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        config: CaptureConfiguration,
        sink: Arc<dyn RecognitionSink>,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            backend,
            config,
            sink,
            delegate: None,
            shared: Arc::new(SessionShared::new(None)),
            trigger: None,
            worker: None,
            session: None,
        })
    }

    /// Pipeline feeding a [`SharedFrameBuffer`] sized from `config`.
    pub fn with_frame_buffer(
        backend: Arc<dyn CaptureBackend>,
        config: CaptureConfiguration,
    ) -> Result<(Self, Arc<SharedFrameBuffer>), CaptureError> {
        let buffer = Arc::new(SharedFrameBuffer::with_policy(
            config.ring_capacity_bytes,
            &config.pull,
        ));
        let sink: Arc<dyn RecognitionSink> = buffer.clone();
        let capture = Self::new(backend, config, sink)?;
        Ok((capture, buffer))
    }

    /// Takes effect from the next `start`.
    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.shared.diagnostics()
    }

    /// Rate the device is actually recording at; 0 before the first start.
    pub fn device_sample_rate(&self) -> u32 {
        self.shared.device_rate.load(Ordering::SeqCst)
    }

    pub fn current_source(&self) -> Option<AudioSourceKind> {
        self.shared.source()
    }

    /// Ask the capture thread to move to the next candidate.
    ///
    /// Returns false (and does nothing) when no session is running or an
    /// attempt is already queued or in flight.
    pub fn request_reconfiguration(&self) -> bool {
        if !self.shared.is_running() {
            return false;
        }
        self.trigger.as_ref().is_some_and(|t| t.request())
    }
}

impl CapturePipeline for AudioCapture {
    fn start(
        &mut self,
        requested_sample_rate: u32,
        preference: SourcePreference,
    ) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            if self.shared.is_running() && !self.shared.state().can_start() {
                return Err(CaptureError::AlreadyActive);
            }
            // The previous session ended on its own; reap its thread first.
            self.stop();
        }
        if requested_sample_rate == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "requested sample rate must be positive".into(),
            ));
        }

        let advertised = if preference.is_loopback() {
            None
        } else {
            self.backend.advertised_rates()
        };
        let space =
            CandidateSpace::for_preference(preference, requested_sample_rate, advertised.as_deref());
        let negotiator = DeviceNegotiator::new(
            Arc::clone(&self.backend),
            preference.device_channels(),
            self.config.min_buffer_bytes,
            self.config.read_timeout(),
        );
        let handle = negotiator.open(&space)?;

        let shared = Arc::new(SessionShared::new(self.delegate.clone()));
        shared.running.store(true, Ordering::SeqCst);
        shared.status(&CaptureStatus::Negotiated {
            source: handle.source(),
            sample_rate: handle.sample_rate(),
        });

        let controller = ReconfigurationController::new(negotiator, space);
        let trigger = controller.trigger();
        let worker = CaptureWorker::new(
            handle,
            controller,
            requested_sample_rate,
            &self.config,
            Arc::clone(&self.sink),
            Arc::clone(&shared),
        );
        shared.set_state(CaptureState::Recording);

        let (done_tx, done_rx) = mpsc::channel();
        let thread_name = if preference.is_loopback() {
            "playback-capture"
        } else {
            "mic-capture"
        };
        let spawned = thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || {
                worker.run();
                let _ = done_tx.send(());
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                shared.running.store(false, Ordering::SeqCst);
                shared.set_state(CaptureState::Stopped);
                self.shared = shared;
                return Err(CaptureError::Unknown(format!(
                    "failed to spawn capture thread: {}",
                    e
                )));
            }
        };

        log::info!(
            "Capture started: requested={} Hz, output={} Hz",
            requested_sample_rate,
            shared.output_rate.load(Ordering::SeqCst)
        );
        self.shared = shared;
        self.trigger = Some(trigger);
        self.worker = Some(WorkerHandle {
            thread,
            done: done_rx,
        });
        self.session = Some(SessionInfo {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            requested_sample_rate,
        });
        Ok(())
    }

    fn stop(&mut self) -> Option<SessionSummary> {
        let worker = self.worker.take()?;
        self.shared.running.store(false, Ordering::SeqCst);
        self.trigger = None;

        let timeout = self.config.join_timeout();
        match worker.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.thread.join().is_err() {
                    log::error!("Capture thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Capture thread did not exit within {:?}, detaching",
                    timeout
                );
            }
        }

        self.shared.set_state(CaptureState::Stopped);
        log::info!("Capture stopped");

        let session = self.session.take()?;
        Some(SessionSummary {
            id: session.id,
            started_at: session.started_at,
            stopped_at: Utc::now(),
            source: self.shared.source(),
            device_sample_rate: self.shared.device_rate.load(Ordering::SeqCst),
            output_sample_rate: self.shared.output_rate.load(Ordering::SeqCst),
            requested_sample_rate: session.requested_sample_rate,
            diagnostics: self.shared.diagnostics(),
        })
    }

    fn is_active(&self) -> bool {
        self.worker.is_some() && self.shared.is_running() && self.shared.state().is_active()
    }

    fn current_output_sample_rate(&self) -> u32 {
        self.shared.output_rate.load(Ordering::SeqCst)
    }

    fn state(&self) -> CaptureState {
        self.shared.state()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
