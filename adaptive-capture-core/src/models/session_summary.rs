use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audio_models::{AudioSourceKind, SessionDiagnostics};

/// Snapshot returned when a capture session stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    /// Last source the session was reading from, if any device was open.
    pub source: Option<AudioSourceKind>,
    pub device_sample_rate: u32,
    pub output_sample_rate: u32,
    pub requested_sample_rate: u32,
    pub diagnostics: SessionDiagnostics,
}

impl SessionSummary {
    pub fn duration_secs(&self) -> f64 {
        (self.stopped_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
