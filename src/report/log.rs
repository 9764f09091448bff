//! Extraction log.
//!
//! Counts what happened to every frame of an extraction run so that skipped
//! or failed frames are never silently lost from a dataset.

use crate::core::features::FeatureError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Frame counters for an extraction run.
#[derive(Debug)]
pub struct ExtractionLog {
    /// Detection records read
    frames_read: AtomicU64,
    /// Dataset rows written
    rows_written: AtomicU64,
    /// Frames where the detector found no pose
    frames_without_pose: AtomicU64,
    /// Frames with a label outside the configured set
    unknown_labels: AtomicU64,
    /// Feature failures by kind
    index_out_of_range: AtomicU64,
    degenerate_vector: AtomicU64,
    degenerate_range: AtomicU64,
    /// Run identifier
    run_id: Uuid,
    /// Run start time
    run_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ExtractionLog {
    /// Create a new extraction log.
    pub fn new() -> Self {
        Self {
            frames_read: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            frames_without_pose: AtomicU64::new(0),
            unknown_labels: AtomicU64::new(0),
            index_out_of_range: AtomicU64::new(0),
            degenerate_vector: AtomicU64::new(0),
            degenerate_range: AtomicU64::new(0),
            run_id: Uuid::new_v4(),
            run_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an extraction log that is saved to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);
        log
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_frame_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_row_written(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_without_pose(&self) {
        self.frames_without_pose.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_label(&self) {
        self.unknown_labels.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a feature failure under its kind.
    pub fn record_feature_error(&self, error: &FeatureError) {
        let counter = match error {
            FeatureError::IndexOutOfRange { .. } => &self.index_out_of_range,
            FeatureError::DegenerateVector { .. } => &self.degenerate_vector,
            FeatureError::DegenerateRange { .. } => &self.degenerate_range,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ExtractionStats {
        ExtractionStats {
            run_id: self.run_id,
            frames_read: self.frames_read.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            frames_without_pose: self.frames_without_pose.load(Ordering::Relaxed),
            unknown_labels: self.unknown_labels.load(Ordering::Relaxed),
            index_out_of_range: self.index_out_of_range.load(Ordering::Relaxed),
            degenerate_vector: self.degenerate_vector.load(Ordering::Relaxed),
            degenerate_range: self.degenerate_range.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Extraction Statistics:\n\
             - Frames read: {}\n\
             - Rows written: {}\n\
             - Frames without pose: {}\n\
             - Unknown labels: {}\n\
             - Failed frames: {} (index out of range: {}, degenerate vector: {}, degenerate range: {})\n\
             - Run duration: {} seconds",
            stats.frames_read,
            stats.rows_written,
            stats.frames_without_pose,
            stats.unknown_labels,
            stats.failed_frames(),
            stats.index_out_of_range,
            stats.degenerate_vector,
            stats.degenerate_range,
            stats.run_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedRun {
                stats: self.stats(),
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load the statistics of the last persisted run.
    pub fn load_last(path: &Path) -> Result<Option<ExtractionStats>, std::io::Error> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let persisted: PersistedRun =
            serde_json::from_str(&content).map_err(std::io::Error::other)?;
        Ok(Some(persisted.stats))
    }
}

impl Default for ExtractionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of extraction statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub run_id: Uuid,
    pub frames_read: u64,
    pub rows_written: u64,
    pub frames_without_pose: u64,
    pub unknown_labels: u64,
    pub index_out_of_range: u64,
    pub degenerate_vector: u64,
    pub degenerate_range: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

impl ExtractionStats {
    /// Frames rejected by feature computation.
    pub fn failed_frames(&self) -> u64 {
        self.index_out_of_range + self.degenerate_vector + self.degenerate_range
    }
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRun {
    stats: ExtractionStats,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared extraction log.
pub type SharedExtractionLog = Arc<ExtractionLog>;

/// Create a new shared extraction log.
pub fn create_shared_log() -> SharedExtractionLog {
    Arc::new(ExtractionLog::new())
}

/// Create a new shared extraction log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedExtractionLog {
    Arc::new(ExtractionLog::with_persistence(path))
}
