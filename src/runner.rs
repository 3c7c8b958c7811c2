//! The checkpointed per-file loop
//!
//! [`CheckpointedRunner`] walks the selected files in sequence order and turns
//! each one into an [`InventoryRecord`]. Records collect in a buffer that is
//! flushed to the sink:
//!
//! - whenever the file index reaches a multiple of the checkpoint interval
//!   (index 0 included),
//! - right after a file whose processing failed,
//! - before pausing for the operator when storage becomes unavailable,
//! - once more at the end, even when the buffer is empty.
//!
//! A crash therefore loses at most one interval of work, and memory use is
//! bounded by the interval.
//!
//! ## Failure handling
//!
//! A file that fails at some stage still gets a record. Its
//! `processing_error` names the stage, whatever was computed before the
//! failure is kept, and the loop moves on. Only sink failures and an
//! operator abort end the run.

use crate::checksum::{ChecksumProvider, ResumeGate};
use crate::classify::ChecksumClassifier;
use crate::error::Result;
use crate::history::{HistorySnapshot, ResumeState};
use crate::media::{self, MediaProbe};
use crate::selection::Selection;
use crate::sink::RecordSink;
use crate::types::{
    ChecksumAlgorithm, HistoryMatch, InventoryRecord, NewFileStatus, ProgressCallback,
    ProgressInfo, MISSING_FILE_MARKER,
};
use crate::utils;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Default number of files between checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10_000;

/// Values that stay fixed for the duration of a run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Root directory being inventoried
    pub root: PathBuf,
    /// Checksum algorithm
    pub algorithm: ChecksumAlgorithm,
    /// Files between checkpoints
    pub checkpoint_interval: usize,
    /// Whether media files are validated
    pub validate_media: bool,
    /// When the run started; names the final inventory
    pub started: NaiveDateTime,
    /// Checkpoint file the sink writes to, if any
    pub checkpoint_path: Option<PathBuf>,
}

impl RunContext {
    /// Context with default interval and media validation on
    pub fn new(root: PathBuf, algorithm: ChecksumAlgorithm) -> Self {
        Self {
            root,
            algorithm,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            validate_media: true,
            started: utils::now_timestamp(),
            checkpoint_path: None,
        }
    }
}

/// Stage of per-file processing, recorded when it fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Reading the file's attributes
    IdentifyingFile,
    /// Computing the checksum
    CalculatingChecksum,
    /// Probing and validating media metadata
    RunningMediaInfo,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessingStage::IdentifyingFile => "identifying file name and directory",
            ProcessingStage::CalculatingChecksum => "calculating checksum",
            ProcessingStage::RunningMediaInfo => "running mediainfo",
        })
    }
}

/// Counters and sets produced by the loop
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Every path that reached processing, resumed paths included
    pub matched: HashSet<String>,
    /// Paths found missing while processing
    pub missing_reported: HashSet<String>,
    /// Index reached in the selection
    pub checkpoint: usize,
    /// Files processed in this run
    pub processed: usize,
    /// Files skipped because a resumed checkpoint already had them
    pub resumed: usize,
    /// Files whose processing failed at some stage
    pub failed: usize,
    /// Files seen for the first time
    pub first_seen: usize,
    /// Files whose checksum matches the prior inventory
    pub consistent: usize,
    /// Files whose checksum changed since the prior inventory
    pub inconsistent: usize,
    /// Files whose checksum was already emitted in this run
    pub duplicates: usize,
    /// Media files with at least one validation failure
    pub validation_failures: usize,
    /// Batches appended to the sink
    pub flushes: usize,
    /// Records appended to the sink
    pub records_written: usize,
}

/// Drives classification and validation over a [`Selection`]
pub struct CheckpointedRunner<'a> {
    context: &'a RunContext,
    history: &'a HistorySnapshot,
    provider: &'a dyn ChecksumProvider,
    probe: &'a dyn MediaProbe,
    gate: &'a mut dyn ResumeGate,
    sink: &'a mut dyn RecordSink,
    progress: Option<ProgressCallback>,
}

impl<'a> CheckpointedRunner<'a> {
    /// Create a runner over the given collaborators
    pub fn new(
        context: &'a RunContext,
        history: &'a HistorySnapshot,
        provider: &'a dyn ChecksumProvider,
        probe: &'a dyn MediaProbe,
        gate: &'a mut dyn ResumeGate,
        sink: &'a mut dyn RecordSink,
    ) -> Self {
        Self {
            context,
            history,
            provider,
            probe,
            gate,
            sink,
            progress: None,
        }
    }

    /// Report progress after every file
    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Process every selected file, skipping those in `resume`
    ///
    /// # Errors
    ///
    /// - [`crate::FixityError::CheckpointWrite`] if the sink cannot be written
    /// - [`crate::FixityError::Interrupted`] if the operator stops the run
    #[instrument(skip_all, fields(root = ?self.context.root, files = selection.total_selected))]
    pub fn run(&mut self, selection: &Selection, resume: &ResumeState) -> Result<RunOutcome> {
        let start = Instant::now();
        let total = selection.selected.len();
        let interval = self.context.checkpoint_interval.max(1);

        let mut classifier = ChecksumClassifier::new(self.history);
        classifier.seed(resume.checksums.iter().cloned());

        let mut outcome = RunOutcome {
            matched: resume.processed_paths.clone(),
            missing_reported: resume.reported_missing.clone(),
            ..Default::default()
        };
        let mut buffer: Vec<InventoryRecord> = Vec::with_capacity(interval.min(total.max(1)));
        let mut current_dir: Option<String> = None;

        for (index, (&sequence, path)) in selection.selected.iter().enumerate() {
            if index % interval == 0 {
                self.flush(&mut buffer, index, &mut outcome)?;
            }
            outcome.checkpoint = index + 1;

            if resume.processed_paths.contains(path) {
                outcome.resumed += 1;
                continue;
            }

            outcome.matched.insert(path.clone());
            let record = self.process_file(sequence, path, &mut classifier, &mut buffer, &mut outcome)?;
            if current_dir.as_deref() != Some(record.parent_dir.as_str()) {
                debug!("Currently processing {}", record.parent_dir);
                current_dir = Some(record.parent_dir.clone());
            }

            let failed = record.processing_error.is_some();
            buffer.push(record);
            outcome.processed += 1;
            if failed {
                self.flush(&mut buffer, outcome.checkpoint, &mut outcome)?;
            }

            if let Some(ref callback) = self.progress {
                callback(ProgressInfo {
                    operation: "Calculating checksums".to_string(),
                    current_item: Some(path.clone()),
                    processed: index + 1,
                    total: Some(total),
                });
            }
        }

        self.flush(&mut buffer, outcome.checkpoint, &mut outcome)?;

        info!(
            "Processed {} files ({} resumed, {} failed, {} new, {} changed, {} duplicates) in {:?}",
            outcome.processed,
            outcome.resumed,
            outcome.failed,
            outcome.first_seen,
            outcome.inconsistent,
            outcome.duplicates,
            start.elapsed()
        );
        Ok(outcome)
    }

    fn flush(
        &mut self,
        buffer: &mut Vec<InventoryRecord>,
        checkpoint: usize,
        outcome: &mut RunOutcome,
    ) -> Result<()> {
        flush_records(&mut *self.sink, buffer, outcome)?;
        debug!(
            "Checkpoint reached: inventory saved after {} files{}",
            checkpoint,
            self.context
                .checkpoint_path
                .as_ref()
                .map(|p| format!(" to {}", p.display()))
                .unwrap_or_default()
        );
        Ok(())
    }

    fn process_file(
        &mut self,
        sequence: u64,
        path: &str,
        classifier: &mut ChecksumClassifier<'_>,
        buffer: &mut Vec<InventoryRecord>,
        outcome: &mut RunOutcome,
    ) -> Result<InventoryRecord> {
        let mut record = InventoryRecord::for_path(path, utils::now_timestamp());
        record.sequence_number = Some(sequence);
        let file_path = Path::new(path);

        match fs::symlink_metadata(file_path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("File is missing or cannot be accessed: {}", path);
                record.processing_error = Some(MISSING_FILE_MARKER.to_string());
                outcome.missing_reported.insert(path.to_string());
                outcome.failed += 1;
                return Ok(record);
            }
            Err(e) => {
                return Ok(stage_failed(record, ProcessingStage::IdentifyingFile, &e, outcome));
            }
        }

        let algorithm = self.context.algorithm;
        record.checksum_algorithm = algorithm.to_string();
        let computed = {
            let sink = &mut *self.sink;
            let mut persist = || flush_records(&mut *sink, &mut *buffer, &mut *outcome);
            classifier.compute_checksum(self.provider, &mut *self.gate, file_path, algorithm, &mut persist)?
        };
        let checksum = match computed {
            Ok(checksum) => checksum,
            Err(e) => {
                return Ok(stage_failed(record, ProcessingStage::CalculatingChecksum, &e, outcome));
            }
        };

        let classification = classifier.classify(path, &checksum);
        record.checksum = classification.checksum;
        record.is_new = classification.is_new;
        record.checksum_status = classification.status;
        if record.is_new == NewFileStatus::FirstSeen {
            outcome.first_seen += 1;
        }
        match record.checksum_status.history {
            HistoryMatch::Consistent => outcome.consistent += 1,
            HistoryMatch::Inconsistent => outcome.inconsistent += 1,
            HistoryMatch::NotApplicable => {}
        }
        if record.checksum_status.duplicate_in_run {
            outcome.duplicates += 1;
        }

        if self.context.validate_media && media::applies_to(&record.file_name) {
            match media::validate_file(self.probe, file_path, &record.file_name) {
                Ok(reasons) => {
                    if !reasons.is_empty() {
                        outcome.validation_failures += 1;
                    }
                    record.validation_errors = reasons;
                }
                Err(e) => {
                    return Ok(stage_failed(record, ProcessingStage::RunningMediaInfo, &e, outcome));
                }
            }
        }

        Ok(record)
    }
}

/// Append the buffer to the sink and clear it
fn flush_records(
    sink: &mut dyn RecordSink,
    buffer: &mut Vec<InventoryRecord>,
    outcome: &mut RunOutcome,
) -> Result<()> {
    sink.append(buffer)?;
    outcome.flushes += 1;
    outcome.records_written += buffer.len();
    buffer.clear();
    Ok(())
}

fn stage_failed(
    mut record: InventoryRecord,
    stage: ProcessingStage,
    err: &dyn fmt::Display,
    outcome: &mut RunOutcome,
) -> InventoryRecord {
    warn!(
        "Error in processing while {}: {} ({})",
        stage, record.full_path, err
    );
    record.processing_error = Some(format!("Error in processing while {}", stage));
    outcome.failed += 1;
    record
}
