use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Output rate used by callers that have no stored preference.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// What happens once a silent window has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceAction {
    /// Move to the next (source, rate) candidate.
    Reconfigure,
    /// Only report the silence through telemetry.
    Report,
}

/// Silence detection settings for one pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilencePolicy {
    /// Levels at or below this percentage count as silent (0-100).
    pub threshold: u8,
    pub window_ms: u64,
    pub action: SilenceAction,
}

impl SilencePolicy {
    pub fn reconfiguring() -> Self {
        Self {
            threshold: 1,
            window_ms: 2000,
            action: SilenceAction::Reconfigure,
        }
    }

    pub fn reporting() -> Self {
        Self {
            threshold: 1,
            window_ms: 3000,
            action: SilenceAction::Report,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for SilencePolicy {
    fn default() -> Self {
        Self::reconfiguring()
    }
}

/// How the consumer side waits for data before padding with silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullPolicy {
    pub max_wait_ms: u64,
    /// Zero bytes returned on a full underrun (320 bytes ≈ 10ms at 16kHz).
    pub pad_bytes: usize,
}

impl PullPolicy {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for PullPolicy {
    fn default() -> Self {
        Self {
            max_wait_ms: 100,
            pad_bytes: 320,
        }
    }
}

/// Configuration for a capture pipeline.
///
/// Deserializable from the JSON settings blob the host application keeps;
/// missing fields fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Floor for the device buffer (bytes) when the platform minimum is
    /// unknown or small.
    pub min_buffer_bytes: usize,

    /// Capacity of the hand-off ring buffer in bytes (default 256 KiB).
    pub ring_capacity_bytes: usize,

    /// Upper bound on a single blocking device read.
    pub read_timeout_ms: u64,

    /// How long `stop` waits for the capture thread before moving on.
    pub join_timeout_ms: u64,

    /// Minimum spacing of level updates sent to the delegate (~10 Hz).
    pub level_report_interval_ms: u64,

    /// Minimum spacing of `level=` log lines.
    pub level_log_interval_ms: u64,

    pub microphone_silence: SilencePolicy,

    pub loopback_silence: SilencePolicy,

    pub pull: PullPolicy,

    /// Pin microphone capture to a built-in device when one is listed.
    pub prefer_built_in_mic: bool,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.ring_capacity_bytes == 0 {
            return Err("ring buffer capacity must be positive".into());
        }
        if self.ring_capacity_bytes % 2 != 0 {
            return Err(format!(
                "ring buffer capacity must hold whole samples: {}",
                self.ring_capacity_bytes
            ));
        }
        if self.min_buffer_bytes < 2 {
            return Err(format!("device buffer floor too small: {}", self.min_buffer_bytes));
        }
        if self.read_timeout_ms == 0 {
            return Err("read timeout must be positive".into());
        }
        if self.join_timeout_ms == 0 {
            return Err("join timeout must be positive".into());
        }
        if self.pull.pad_bytes % 2 != 0 {
            return Err(format!("pad length must be even: {}", self.pull.pad_bytes));
        }
        for (name, policy) in [
            ("microphone", &self.microphone_silence),
            ("loopback", &self.loopback_silence),
        ] {
            if policy.threshold > 100 {
                return Err(format!("{name} silence threshold out of range: {}", policy.threshold));
            }
            if policy.window_ms == 0 {
                return Err(format!("{name} silence window must be positive"));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON settings blob.
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("invalid capture settings: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn level_report_interval(&self) -> Duration {
        Duration::from_millis(self.level_report_interval_ms)
    }

    pub fn level_log_interval(&self) -> Duration {
        Duration::from_millis(self.level_log_interval_ms)
    }

    /// The silence policy active for a microphone or loopback pipeline.
    pub fn silence_policy(&self, loopback: bool) -> SilencePolicy {
        if loopback {
            self.loopback_silence
        } else {
            self.microphone_silence
        }
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            min_buffer_bytes: 8192,
            ring_capacity_bytes: 256 * 1024,
            read_timeout_ms: 100,
            join_timeout_ms: 1000,
            level_report_interval_ms: 100,
            level_log_interval_ms: 1000,
            microphone_silence: SilencePolicy::reconfiguring(),
            loopback_silence: SilencePolicy::reporting(),
            pull: PullPolicy::default(),
            prefer_built_in_mic: true,
        }
    }
}
