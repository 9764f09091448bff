//! Batch extraction of dataset rows from detection records.
//!
//! Frames are processed independently, optionally across a pool of worker
//! threads, and rows are written in input order. What happens to a frame
//! that cannot be turned into a row is decided by the [`ErrorPolicy`].

use crate::config::{ErrorPolicy, LabelSet};
use crate::core::dataset::{DatasetError, DatasetWriter, FeatureRow};
use crate::core::features::{FeatureError, FeatureExtractor, FeatureMode};
use crate::detector::{DetectionRecord, DetectorError};
use crate::report::{ExtractionStats, SharedExtractionLog};
use crossbeam_channel::bounded;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Destination for extracted rows.
pub trait RowSink {
    fn write_row(&mut self, row: &FeatureRow) -> Result<(), DatasetError>;

    fn flush(&mut self) -> Result<(), DatasetError> {
        Ok(())
    }
}

impl RowSink for DatasetWriter {
    fn write_row(&mut self, row: &FeatureRow) -> Result<(), DatasetError> {
        DatasetWriter::write_row(self, row)
    }

    fn flush(&mut self) -> Result<(), DatasetError> {
        DatasetWriter::flush(self)
    }
}

impl RowSink for Vec<FeatureRow> {
    fn write_row(&mut self, row: &FeatureRow) -> Result<(), DatasetError> {
        self.push(row.clone());
        Ok(())
    }
}

/// Settings for one extraction run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: FeatureMode,
    pub labels: LabelSet,
    pub on_error: ErrorPolicy,
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: FeatureMode::Angles,
            labels: LabelSet::exercises(),
            on_error: ErrorPolicy::Abort,
            workers: 1,
        }
    }
}

/// What became of a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Row(FeatureRow),
    /// The detector found no pose in the frame
    NoPose,
    UnknownLabel(String),
    Failed(FeatureError),
}

/// Turn one detection record into a frame outcome.
pub fn process_frame(
    extractor: &FeatureExtractor,
    record: &DetectionRecord,
    mode: FeatureMode,
    labels: &LabelSet,
) -> FrameOutcome {
    if !labels.contains(&record.label) {
        return FrameOutcome::UnknownLabel(record.label.clone());
    }
    if !record.has_pose() {
        return FrameOutcome::NoPose;
    }
    match extractor.extract(&record.landmarks, mode) {
        Ok(values) => FrameOutcome::Row(FeatureRow::new(record.label.clone(), values)),
        Err(e) => FrameOutcome::Failed(e),
    }
}

/// Errors that end an extraction run.
#[derive(Debug)]
pub enum BatchError {
    Detector(DetectorError),
    Dataset(DatasetError),
    /// A frame failed under the abort policy
    Frame {
        index: usize,
        source: String,
        error: FeatureError,
    },
    /// A frame carried a label outside the configured set under the abort policy
    UnknownLabel {
        index: usize,
        source: String,
        label: String,
    },
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::Detector(e) => write!(f, "Detection input error: {e}"),
            BatchError::Dataset(e) => write!(f, "Dataset error: {e}"),
            BatchError::Frame {
                index,
                source,
                error,
            } => write!(f, "Frame {index} ({source}) failed: {error}"),
            BatchError::UnknownLabel {
                index,
                source,
                label,
            } => write!(f, "Frame {index} ({source}) has unknown label '{label}'"),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Detector(e) => Some(e),
            BatchError::Dataset(e) => Some(e),
            BatchError::Frame { error, .. } => Some(error),
            BatchError::UnknownLabel { .. } => None,
        }
    }
}

impl From<DatasetError> for BatchError {
    fn from(e: DatasetError) -> Self {
        BatchError::Dataset(e)
    }
}

impl From<DetectorError> for BatchError {
    fn from(e: DetectorError) -> Self {
        BatchError::Detector(e)
    }
}

/// A processed frame on its way to the writer.
struct FrameResult {
    source: String,
    outcome: FrameOutcome,
}

/// Runs feature extraction over a stream of detection records.
pub struct BatchExtractor {
    extractor: FeatureExtractor,
    options: BatchOptions,
    log: SharedExtractionLog,
    cancel: Arc<AtomicBool>,
}

impl BatchExtractor {
    pub fn new(extractor: FeatureExtractor, options: BatchOptions, log: SharedExtractionLog) -> Self {
        Self {
            extractor,
            options,
            log,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an external flag to stop reading further records (e.g. on Ctrl+C).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Process every record and write one row per usable frame.
    ///
    /// Rows are written in record order regardless of the worker count. On
    /// abort, rows for frames before the failing one are kept and flushed.
    pub fn run<I, S>(&self, records: I, sink: &mut S) -> Result<ExtractionStats, BatchError>
    where
        I: IntoIterator<Item = Result<DetectionRecord, DetectorError>>,
        I::IntoIter: Send,
        S: RowSink,
    {
        info!(
            run_id = %self.log.run_id(),
            mode = %self.options.mode,
            workers = self.options.workers,
            on_error = %self.options.on_error,
            "Starting extraction"
        );

        let result = if self.options.workers <= 1 {
            self.run_sequential(records.into_iter(), sink)
        } else {
            self.run_parallel(records.into_iter(), sink)
        };
        let flushed = sink.flush();

        result?;
        flushed?;

        let stats = self.log.stats();
        info!(
            frames = stats.frames_read,
            rows = stats.rows_written,
            failed = stats.failed_frames(),
            "Extraction finished"
        );
        Ok(stats)
    }

    fn process(&self, record: &DetectionRecord) -> FrameResult {
        FrameResult {
            source: record.describe().to_string(),
            outcome: process_frame(
                &self.extractor,
                record,
                self.options.mode,
                &self.options.labels,
            ),
        }
    }

    fn run_sequential<I, S>(&self, records: I, sink: &mut S) -> Result<(), BatchError>
    where
        I: Iterator<Item = Result<DetectionRecord, DetectorError>>,
        S: RowSink,
    {
        for (index, record) in records.enumerate() {
            if self.is_cancelled() {
                info!(frame = index, "Extraction cancelled");
                break;
            }
            let record = record?;
            let result = self.process(&record);
            self.handle(index, result, sink)?;
        }
        Ok(())
    }

    fn run_parallel<I, S>(&self, records: I, sink: &mut S) -> Result<(), BatchError>
    where
        I: Iterator<Item = Result<DetectionRecord, DetectorError>> + Send,
        S: RowSink,
    {
        let workers = self.options.workers;

        thread::scope(|scope| {
            // Channels live inside the scope so an early return drops the
            // receiver and lets blocked workers exit before the join.
            let (job_tx, job_rx) = bounded::<(usize, DetectionRecord)>(workers * 4);
            let (result_tx, result_rx) =
                bounded::<(usize, Result<FrameResult, DetectorError>)>(workers * 4);

            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, record) in job_rx.iter() {
                        let result = self.process(&record);
                        if result_tx.send((index, Ok(result))).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);

            let cancel = Arc::clone(&self.cancel);
            scope.spawn(move || {
                for (index, record) in records.enumerate() {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    match record {
                        Ok(record) => {
                            if job_tx.send((index, record)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = result_tx.send((index, Err(e)));
                            break;
                        }
                    }
                }
            });

            let mut pending = BTreeMap::new();
            let mut next = 0;
            for (index, result) in result_rx.iter() {
                pending.insert(index, result);
                while let Some(result) = pending.remove(&next) {
                    let handled = result
                        .map_err(BatchError::from)
                        .and_then(|result| self.handle(next, result, sink));
                    if let Err(e) = handled {
                        self.cancel.store(true, Ordering::SeqCst);
                        return Err(e);
                    }
                    next += 1;
                }
            }

            if self.is_cancelled() {
                info!(frame = next, "Extraction cancelled");
            }
            Ok(())
        })
    }

    /// Apply the error policy to one frame and write its row if it has one.
    fn handle<S: RowSink>(
        &self,
        index: usize,
        result: FrameResult,
        sink: &mut S,
    ) -> Result<(), BatchError> {
        self.log.record_frame_read();

        match result.outcome {
            FrameOutcome::Row(row) => {
                sink.write_row(&row)?;
                self.log.record_row_written();
                debug!(frame = index, source = %result.source, "Row written");
            }
            FrameOutcome::NoPose => {
                self.log.record_frame_without_pose();
                debug!(frame = index, source = %result.source, "No pose detected");
            }
            FrameOutcome::UnknownLabel(label) => {
                self.log.record_unknown_label();
                match self.options.on_error {
                    ErrorPolicy::Skip => {
                        warn!(frame = index, source = %result.source, label = %label, "Skipping frame with unknown label");
                    }
                    ErrorPolicy::Abort => {
                        return Err(BatchError::UnknownLabel {
                            index,
                            source: result.source,
                            label,
                        });
                    }
                }
            }
            FrameOutcome::Failed(error) => {
                self.log.record_feature_error(&error);
                match self.options.on_error {
                    ErrorPolicy::Skip => {
                        warn!(frame = index, source = %result.source, kind = error.kind(), "Skipping frame: {error}");
                    }
                    ErrorPolicy::Abort => {
                        return Err(BatchError::Frame {
                            index,
                            source: result.source,
                            error,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
