use std::time::Instant;

use crate::models::config::{SilenceAction, SilencePolicy};

/// Outcome of feeding one frame's level to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceVerdict {
    Sound,
    Silent,
    /// The policy window elapsed; act on it.
    Triggered,
}

/// Tracks how long the input has stayed at or below the silence threshold.
///
/// With [`SilenceAction::Reconfigure`] the timer restarts after each
/// trigger, so continued silence triggers once per window. With
/// [`SilenceAction::Report`] a silent stretch triggers once and the monitor
/// stays quiet until sound returns.
#[derive(Debug, Clone)]
pub struct SilenceMonitor {
    policy: SilencePolicy,
    silent_since: Option<Instant>,
    reported: bool,
}

impl SilenceMonitor {
    pub fn new(policy: SilencePolicy) -> Self {
        Self {
            policy,
            silent_since: None,
            reported: false,
        }
    }

    pub fn policy(&self) -> &SilencePolicy {
        &self.policy
    }

    pub fn observe(&mut self, level: u8, now: Instant) -> SilenceVerdict {
        if level > self.policy.threshold {
            self.silent_since = None;
            self.reported = false;
            return SilenceVerdict::Sound;
        }

        let since = *self.silent_since.get_or_insert(now);
        if now.saturating_duration_since(since) < self.policy.window() {
            return SilenceVerdict::Silent;
        }

        match self.policy.action {
            SilenceAction::Reconfigure => {
                self.silent_since = None;
                SilenceVerdict::Triggered
            }
            SilenceAction::Report if self.reported => SilenceVerdict::Silent,
            SilenceAction::Report => {
                self.reported = true;
                SilenceVerdict::Triggered
            }
        }
    }

    /// Forget the current silent stretch, e.g. after switching devices.
    pub fn reset(&mut self) {
        self.silent_since = None;
        self.reported = false;
    }
}
