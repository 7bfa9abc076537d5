//! # Transfer State Machine
//!
//! Data model for one file's upload lifecycle.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Uploading → Uploaded
//!    ↑          ↓
//!    └───── Failed        (retry)
//! ```
//!
//! `Pending` and `Failed` items may also be removed from the queue entirely.
//! `Uploaded` is terminal.

use crate::{Result, SyncError};
use bridge_traits::FileRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a queued transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(Uuid);

impl TransferId {
    /// Create a new random transfer ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// Where a transfer is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Waiting for its turn
    Pending,
    /// The single in-flight transfer
    Uploading,
    /// Present on the share
    Uploaded,
    /// Last attempt failed; stalls the queue until retried or cancelled
    Failed,
}

impl TransferStatus {
    /// Still occupies its name in the queue (anything but uploaded)
    pub fn is_queued(&self) -> bool {
        !matches!(self, TransferStatus::Uploaded)
    }

    /// Whether the item may be removed by cancel
    pub fn is_removable(&self) -> bool {
        matches!(self, TransferStatus::Pending | TransferStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Uploading => "uploading",
            TransferStatus::Uploaded => "uploaded",
            TransferStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Transfer Item
// ============================================================================

/// One file's position in the upload queue.
///
/// Mutated only by the queue; observers receive clones through
/// [`QueueSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: TransferId,
    pub file: FileRef,
    pub status: TransferStatus,
    /// Fraction in `[0.0, 1.0]`
    pub progress: f64,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    /// Present only while `Failed`
    pub last_error: Option<String>,
    /// Milliseconds since the Unix epoch
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl TransferItem {
    /// Create a pending item for `file`.
    pub fn new(file: FileRef, now_ms: i64) -> Self {
        let total_bytes = file.size_bytes;
        Self {
            id: TransferId::new(),
            file,
            status: TransferStatus::Pending,
            progress: 0.0,
            bytes_transferred: 0,
            total_bytes,
            last_error: None,
            enqueued_at: now_ms,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    /// Pending → Uploading
    pub fn start(&mut self, now_ms: i64) -> Result<()> {
        self.validate_transition(TransferStatus::Uploading)?;
        self.status = TransferStatus::Uploading;
        self.progress = 0.0;
        self.bytes_transferred = 0;
        self.started_at = Some(now_ms);
        self.finished_at = None;
        Ok(())
    }

    /// Apply a progress report from the in-flight upload.
    ///
    /// Ignored unless the item is uploading. `written` is clamped to `total`
    /// and never moves backwards. Returns whether anything changed.
    pub fn record_progress(&mut self, written: u64, total: u64) -> bool {
        if self.status != TransferStatus::Uploading {
            return false;
        }

        let written = written.min(total).max(self.bytes_transferred.min(total));
        if written == self.bytes_transferred && total == self.total_bytes {
            return false;
        }

        self.total_bytes = total;
        self.bytes_transferred = written;
        self.progress = fraction(written, total);
        true
    }

    /// Uploading → Uploaded
    pub fn complete(&mut self, now_ms: i64) -> Result<()> {
        self.validate_transition(TransferStatus::Uploaded)?;
        self.status = TransferStatus::Uploaded;
        self.bytes_transferred = self.total_bytes;
        self.progress = 1.0;
        self.finished_at = Some(now_ms);
        Ok(())
    }

    /// Uploading → Failed
    pub fn fail(&mut self, message: impl Into<String>, now_ms: i64) -> Result<()> {
        self.validate_transition(TransferStatus::Failed)?;
        self.status = TransferStatus::Failed;
        self.last_error = Some(message.into());
        self.finished_at = Some(now_ms);
        Ok(())
    }

    /// Failed → Pending, clearing the error and all progress.
    pub fn reset_for_retry(&mut self) -> Result<()> {
        if self.status != TransferStatus::Failed {
            return Err(SyncError::NotFailed {
                name: self.file.name.clone(),
                status: self.status.to_string(),
            });
        }

        self.status = TransferStatus::Pending;
        self.last_error = None;
        self.progress = 0.0;
        self.bytes_transferred = 0;
        self.started_at = None;
        self.finished_at = None;
        Ok(())
    }

    /// Wall time of the last attempt in milliseconds
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) if end >= start => Some((end - start) as u64),
            _ => None,
        }
    }

    /// Average upload speed, once the attempt has finished.
    pub fn throughput_bytes_per_sec(&self) -> Option<f64> {
        let duration_ms = self.duration_ms()?;
        if duration_ms == 0 {
            return None;
        }
        Some(self.bytes_transferred as f64 * 1000.0 / duration_ms as f64)
    }

    fn validate_transition(&self, to: TransferStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (TransferStatus::Pending, TransferStatus::Uploading)
                | (TransferStatus::Uploading, TransferStatus::Uploaded)
                | (TransferStatus::Uploading, TransferStatus::Failed)
                | (TransferStatus::Failed, TransferStatus::Pending)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        Ok(())
    }
}

fn fraction(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Read-only copy of the queue, in queue order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<TransferItem>,
}

impl QueueSnapshot {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item with the given file name, if queued
    pub fn find(&self, name: &str) -> Option<&TransferItem> {
        self.items.iter().find(|item| item.file.name == name)
    }

    /// The in-flight item, if any
    pub fn uploading(&self) -> Option<&TransferItem> {
        self.items
            .iter()
            .find(|item| item.status == TransferStatus::Uploading)
    }

    pub fn count(&self, status: TransferStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    /// Counts per status and byte totals across every queued item.
    pub fn summary(&self) -> QueueSummary {
        let mut summary = QueueSummary::default();
        for item in &self.items {
            match item.status {
                TransferStatus::Pending => summary.pending += 1,
                TransferStatus::Uploading => summary.uploading += 1,
                TransferStatus::Uploaded => summary.uploaded += 1,
                TransferStatus::Failed => summary.failed += 1,
            }
            summary.total_bytes += item.total_bytes;
            summary.transferred_bytes += item.bytes_transferred;
        }
        summary
    }
}

/// Aggregate queue state, as shown in a status bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub pending: usize,
    pub uploading: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
}

impl QueueSummary {
    /// Bytes transferred over bytes queued, in `[0.0, 1.0]`
    pub fn overall_progress(&self) -> f64 {
        fraction(self.transferred_bytes, self.total_bytes)
    }

    pub fn total_items(&self) -> usize {
        self.pending + self.uploading + self.uploaded + self.failed
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Human-readable size with binary units and at most one decimal,
/// e.g. `"1,023 B"`, `"1.5 KB"`, `"9.5 MB"`.
pub fn format_file_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if size == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut scaled = size as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    let tenths = (scaled * 10.0).round() as u64;
    let whole = group_thousands(tenths / 10);
    match tenths % 10 {
        0 => format!("{} {}", whole, UNITS[unit]),
        decimal => format!("{}.{} {}", whole, decimal, UNITS[unit]),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, size: u64) -> TransferItem {
        TransferItem::new(FileRef::new(name, format!("/cam/{}", name), size), 1_000)
    }

    #[test]
    fn test_status_helpers() {
        assert!(TransferStatus::Pending.is_queued());
        assert!(TransferStatus::Uploading.is_queued());
        assert!(TransferStatus::Failed.is_queued());
        assert!(!TransferStatus::Uploaded.is_queued());
        assert!(TransferStatus::Failed.is_removable());
        assert!(!TransferStatus::Uploading.is_removable());
        assert_eq!(TransferStatus::Uploading.to_string(), "uploading");
        assert_ne!(TransferId::new(), TransferId::new());
    }

    #[test]
    fn test_new_item_is_pending() {
        let item = item("a.jpg", 4096);
        assert_eq!(item.status, TransferStatus::Pending);
        assert_eq!(item.total_bytes, 4096);
        assert_eq!(item.bytes_transferred, 0);
        assert!(item.last_error.is_none());
    }

    #[test]
    fn test_successful_lifecycle() {
        let mut item = item("a.jpg", 2_000);
        item.start(1_000).unwrap();
        assert!(item.record_progress(1_000, 2_000));
        assert_eq!(item.progress, 0.5);

        item.complete(3_000).unwrap();
        assert_eq!(item.status, TransferStatus::Uploaded);
        assert_eq!(item.bytes_transferred, 2_000);
        assert_eq!(item.progress, 1.0);
        assert_eq!(item.duration_ms(), Some(2_000));
        assert_eq!(item.throughput_bytes_per_sec(), Some(1_000.0));
    }

    #[test]
    fn test_uploaded_is_terminal() {
        let mut item = item("a.jpg", 10);
        item.start(0).unwrap();
        item.complete(1).unwrap();

        assert!(item.start(2).is_err());
        assert!(item.fail("late", 2).is_err());
        assert!(matches!(item.reset_for_retry(), Err(SyncError::NotFailed { .. })));
    }

    #[test]
    fn test_progress_ignored_unless_uploading() {
        let mut item = item("a.jpg", 10);
        assert!(!item.record_progress(5, 10));
        assert_eq!(item.bytes_transferred, 0);
    }

    #[test]
    fn test_progress_is_clamped_and_monotonic() {
        let mut item = item("a.jpg", 10);
        item.start(0).unwrap();

        item.record_progress(50, 10);
        assert_eq!(item.bytes_transferred, 10);

        let mut item = self::item("b.jpg", 10);
        item.start(0).unwrap();
        item.record_progress(6, 10);
        assert!(!item.record_progress(4, 10));
        assert_eq!(item.bytes_transferred, 6);
    }

    #[test]
    fn test_fail_then_retry_clears_state() {
        let mut item = item("a.jpg", 10);
        item.start(0).unwrap();
        item.record_progress(4, 10);
        item.fail("connection reset", 5).unwrap();
        assert_eq!(item.last_error.as_deref(), Some("connection reset"));

        item.reset_for_retry().unwrap();
        assert_eq!(item.status, TransferStatus::Pending);
        assert_eq!(item.progress, 0.0);
        assert_eq!(item.bytes_transferred, 0);
        assert!(item.last_error.is_none());
        assert!(item.started_at.is_none());
    }

    #[test]
    fn test_pending_cannot_complete() {
        let mut item = item("a.jpg", 10);
        let err = item.complete(0).unwrap_err();
        assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_snapshot_summary() {
        let mut uploading = item("b.jpg", 300);
        uploading.start(0).unwrap();
        uploading.record_progress(100, 300);

        let mut failed = item("c.jpg", 100);
        failed.start(0).unwrap();
        failed.fail("boom", 1).unwrap();

        let snapshot = QueueSnapshot {
            items: vec![item("a.jpg", 600), uploading, failed],
        };

        let summary = snapshot.summary();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.uploading, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_items(), 3);
        assert_eq!(summary.total_bytes, 1_000);
        assert_eq!(summary.transferred_bytes, 100);
        assert!((summary.overall_progress() - 0.1).abs() < f64::EPSILON);

        assert_eq!(snapshot.uploading().unwrap().name(), "b.jpg");
        assert_eq!(snapshot.find("c.jpg").unwrap().status, TransferStatus::Failed);
        assert!(snapshot.find("d.jpg").is_none());
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1023), "1,023 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10_000_000), "9.5 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024), "5 GB");
        assert_eq!(format_file_size(2_000 * 1024u64.pow(4)), "2,000 TB");
    }
}
