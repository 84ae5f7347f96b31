//! Per-document extraction progress, readable by concurrent observers and
//! streamable over SSE.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Idle,
    Processing,
    Completed,
    Failed,
}

/// The four-tuple observers read while an extraction advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionProgress {
    pub status: ProgressStatus,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ExtractionProgress {
    #[must_use]
    pub fn idle() -> Self {
        Self {
            status: ProgressStatus::Idle,
            total: 0,
            completed: 0,
            failed: 0,
        }
    }

    /// Whether the SSE stream for this record should terminate.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ProgressStatus::Completed | ProgressStatus::Failed
        )
    }
}

/// Progress map plus a broadcast feed of changes.
///
/// Writers update under a coarse lock and publish the new snapshot;
/// readers either take a consistent snapshot or subscribe for changes.
pub struct ProgressTracker {
    records: RwLock<HashMap<String, ExtractionProgress>>,
    changes: broadcast::Sender<(String, ExtractionProgress)>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            records: RwLock::new(HashMap::new()),
            changes,
        }
    }

    #[must_use]
    pub fn get(&self, document_id: &str) -> ExtractionProgress {
        self.records
            .read()
            .get(document_id)
            .copied()
            .unwrap_or_else(ExtractionProgress::idle)
    }

    pub fn start(&self, document_id: &str, total: usize) {
        self.set(
            document_id,
            ExtractionProgress {
                status: ProgressStatus::Processing,
                total,
                completed: 0,
                failed: 0,
            },
        );
    }

    /// Apply `update` to the current record and broadcast the result.
    pub fn update(&self, document_id: &str, update: impl FnOnce(&mut ExtractionProgress)) {
        let snapshot = {
            let mut records = self.records.write();
            let record = records
                .entry(document_id.to_string())
                .or_insert_with(ExtractionProgress::idle);
            update(record);
            *record
        };
        let _ = self.changes.send((document_id.to_string(), snapshot));
    }

    pub fn set(&self, document_id: &str, progress: ExtractionProgress) {
        self.update(document_id, |p| *p = progress);
    }

    pub fn complete(&self, document_id: &str) {
        self.update(document_id, |p| p.status = ProgressStatus::Completed);
    }

    pub fn fail(&self, document_id: &str) {
        self.update(document_id, |p| p.status = ProgressStatus::Failed);
    }

    /// Subscribe to change events. Receivers filter by document id.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<(String, ExtractionProgress)> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_accumulate_and_terminate() {
        let tracker = ProgressTracker::new();
        tracker.start("doc_1", 3);
        tracker.update("doc_1", |p| p.completed += 1);
        tracker.update("doc_1", |p| p.completed += 2);
        tracker.complete("doc_1");

        let p = tracker.get("doc_1");
        assert_eq!(p.total, 3);
        assert_eq!(p.completed, 3);
        assert_eq!(p.failed, 0);
        assert!(p.is_terminal());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();
        tracker.start("doc_9", 1);
        let (id, p) = rx.recv().await.unwrap();
        assert_eq!(id, "doc_9");
        assert_eq!(p.status, ProgressStatus::Processing);
    }

    #[test]
    fn unknown_document_reads_idle() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.get("doc_nope"), ExtractionProgress::idle());
    }
}
