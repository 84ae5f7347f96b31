//! Extraction job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

/// One extraction run for a document. For ZIP fan-out the sub-unit
/// counters track archive members; single files count as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: String,
    pub document_id: String,
    pub status: JobStatus,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Where the raw remote result was persisted, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    /// Which schema drove the Extract step: "adaptive" or "default".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_label: Option<String>,
}

impl ExtractionJob {
    pub fn new(id: String, document_id: impl Into<String>, total: usize) -> Self {
        Self {
            id,
            document_id: document_id.into(),
            status: JobStatus::Processing,
            total,
            completed: 0,
            failed: 0,
            started_at: Utc::now(),
            finished_at: None,
            result_path: None,
            schema_label: None,
        }
    }

    pub fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}
