use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::negotiation::candidates::{spliced_rates, Candidate, CandidateSpace};
use crate::negotiation::device_handle::DeviceHandle;
use crate::negotiation::negotiator::DeviceNegotiator;

/// Result of one reconfiguration pass.
pub enum Reconfiguration {
    /// A different candidate is now recording; the old device is released.
    Switched(DeviceHandle),
    /// Nothing else opened. The previous device is still recording.
    Exhausted(DeviceHandle),
    /// Another attempt was already running; nothing was touched.
    Skipped(DeviceHandle),
    /// The old device was released and no replacement started.
    Lost,
}

/// Clears the in-flight flag when the attempt ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Caller-side handle for asking the capture thread to reconfigure.
#[derive(Debug, Clone)]
pub struct ReconfigurationTrigger {
    in_flight: Arc<AtomicBool>,
    pending: Arc<AtomicBool>,
}

impl ReconfigurationTrigger {
    /// Queue a reconfiguration. Returns false if one is already queued or
    /// running; the request is dropped in that case.
    pub fn request(&self) -> bool {
        if self.in_flight.load(Ordering::SeqCst) {
            return false;
        }
        self.pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Walks the candidate space from the current position looking for a
/// working alternative. Fail-open: if nothing else works, the current
/// device keeps recording.
pub struct ReconfigurationController {
    negotiator: DeviceNegotiator,
    space: CandidateSpace,
    in_flight: Arc<AtomicBool>,
    pending: Arc<AtomicBool>,
}

impl ReconfigurationController {
    pub fn new(negotiator: DeviceNegotiator, space: CandidateSpace) -> Self {
        Self {
            negotiator,
            space,
            in_flight: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn negotiator(&self) -> &DeviceNegotiator {
        &self.negotiator
    }

    pub fn space(&self) -> &CandidateSpace {
        &self.space
    }

    pub fn trigger(&self) -> ReconfigurationTrigger {
        ReconfigurationTrigger {
            in_flight: Arc::clone(&self.in_flight),
            pending: Arc::clone(&self.pending),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Consume a queued manual request.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    /// Try the candidates after `current`, wrapping through the remaining
    /// sources, for at most one full pass of the space.
    ///
    /// A replacement is prepared before the current device is released;
    /// only once it opened is the old one stopped and the new one started.
    /// `on_attempt` runs before each candidate is tried. Gives up early when
    /// `running` goes false.
    pub fn reconfigure(
        &mut self,
        current: DeviceHandle,
        running: &AtomicBool,
        mut on_attempt: impl FnMut(&Candidate),
    ) -> Reconfiguration {
        let in_flight = Arc::clone(&self.in_flight);
        let Some(_guard) = InFlightGuard::acquire(&in_flight) else {
            log::debug!("Reconfiguration already in flight, skipping");
            return Reconfiguration::Skipped(current);
        };
        self.pending.store(false, Ordering::SeqCst);

        let start = current.candidate();
        let source_count = self.space.sources().len();
        let mut source_index = start.source_index;
        let mut rate_index = start.rate_index + 1;

        if let Some(routed) = current.routed_device() {
            if !routed.sample_rates.is_empty() {
                let current_rate = self
                    .space
                    .rates()
                    .get(start.rate_index)
                    .copied()
                    .unwrap_or(start.sample_rate);
                let rates = spliced_rates(&routed.sample_rates, self.space.requested_rate());
                if let Some(pos) = rates.iter().position(|&r| r == current_rate) {
                    rate_index = pos + 1;
                }
                log::debug!("Using routed device rates {:?}", rates);
                self.space.set_rates(rates);
            }
        }

        let max_attempts = (source_count * self.space.rates().len()).max(1);
        let mut current = Some(current);
        let mut attempts = 0;

        while attempts < max_attempts && running.load(Ordering::SeqCst) {
            if rate_index >= self.space.rates().len() {
                source_index = (source_index + 1) % source_count.max(1);
                self.space.reset_rates();
                rate_index = 0;
                if source_index == start.source_index {
                    break;
                }
                continue;
            }

            let Some(candidate) = self.space.candidate(source_index, rate_index) else {
                break;
            };
            attempts += 1;
            on_attempt(&candidate);
            log::info!(
                "Reconfiguring: trying source={} sample_rate={}",
                candidate.source,
                candidate.sample_rate
            );

            let prepared = match self.negotiator.prepare(candidate) {
                Ok(prepared) => prepared,
                Err(e) => {
                    log::debug!("Reconfiguration candidate failed: {}", e);
                    rate_index += 1;
                    continue;
                }
            };

            if let Some(mut old) = current.take() {
                old.close();
            }

            match prepared.activate() {
                Ok(handle) => {
                    log::info!(
                        "Reconfigured to source={} sample_rate={}",
                        candidate.source,
                        candidate.sample_rate
                    );
                    return Reconfiguration::Switched(handle);
                }
                Err(e) => {
                    log::warn!(
                        "Replacement {} at {} Hz opened but failed to start: {}",
                        candidate.source,
                        candidate.sample_rate,
                        e
                    );
                    rate_index += 1;
                }
            }
        }

        match current {
            Some(handle) => {
                log::warn!("Reconfiguration exhausted after {} attempts; keeping current device", attempts);
                Reconfiguration::Exhausted(handle)
            }
            None => {
                log::error!("Reconfiguration lost the capture device");
                Reconfiguration::Lost
            }
        }
    }
}
