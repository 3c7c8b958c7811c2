//! Top-level orchestration of an inventory run
//!
//! An [`Inventory`] ties the components together:
//!
//! 1. validate the configuration (before anything is scanned)
//! 2. load the latest finished inventory of the root as history
//! 3. pick up an interrupted run's checkpoint file, if one exists
//! 4. select files, run the checkpointed loop, reconcile
//! 5. rename the checkpoint file to its final timestamped name
//!
//! If the run stops early the checkpoint file stays where it is, and the next
//! run over the same root completes it.

use crate::checksum::{ChecksumProvider, DigestChecksumProvider, ResumeGate, StdinResumeGate};
use crate::config::InventoryConfig;
use crate::error::{FixityError, Result};
use crate::history::{HistorySnapshot, ResumeState};
use crate::media::{MediaInfoProbe, MediaProbe};
use crate::reconcile::ReconciliationReporter;
use crate::runner::{CheckpointedRunner, RunContext, RunOutcome};
use crate::selection::FileSelector;
use crate::sink::{CsvInventorySink, RecordSink};
use crate::types::{ChecksumAlgorithm, ProgressCallback};
use crate::utils;
use chrono::NaiveDateTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct InventoryReport {
    /// Canonical root directory that was inventoried
    pub root: PathBuf,
    /// Finished inventory file, when written to disk
    pub inventory_path: Option<PathBuf>,
    /// Prior inventory used as history
    pub history_source: Option<PathBuf>,
    /// Whether an interrupted run's checkpoint was completed
    pub resumed: bool,
    /// When the run started
    pub started: NaiveDateTime,
    /// Files selected for processing
    pub total_selected: usize,
    /// Files skipped by the filter
    pub total_excluded: usize,
    /// Missing-file records written by reconciliation
    pub missing: usize,
    /// Not-selected records written by reconciliation
    pub not_selected: usize,
    /// Counters from the per-file loop
    pub outcome: RunOutcome,
    /// Wall-clock duration
    pub duration: Duration,
}

impl InventoryReport {
    /// Files that need a person to look at them
    pub fn flagged(&self) -> usize {
        self.outcome.inconsistent
            + self.outcome.duplicates
            + self.outcome.validation_failures
            + self.outcome.failed
            + self.missing
    }

    /// True when nothing was flagged
    pub fn is_clean(&self) -> bool {
        self.flagged() == 0
    }
}

/// A configured inventory of one root directory
pub struct Inventory {
    config: InventoryConfig,
    algorithm: ChecksumAlgorithm,
    provider: Box<dyn ChecksumProvider>,
    probe: Box<dyn MediaProbe>,
    gate: Box<dyn ResumeGate>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory")
            .field("config", &self.config)
            .field("algorithm", &self.algorithm)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Inventory {
    /// Validate `config` and create an inventory with the default collaborators
    ///
    /// Files are hashed with [`DigestChecksumProvider`], media is probed with
    /// the `mediainfo` tool, and connectivity pauses wait on standard input.
    ///
    /// # Errors
    ///
    /// - [`FixityError::InvalidConfiguration`] if the configuration is unusable
    pub fn new(config: InventoryConfig) -> Result<Self> {
        config.validate()?;
        let algorithm = config.algorithm();
        let probe = match &config.mediainfo_program {
            Some(program) => MediaInfoProbe::with_program(program.clone()),
            None => MediaInfoProbe::default(),
        };
        Ok(Self {
            config,
            algorithm,
            provider: Box::new(DigestChecksumProvider::new()),
            probe: Box::new(probe),
            gate: Box::new(StdinResumeGate),
            progress: None,
        })
    }

    /// Hash files with `provider`
    pub fn with_checksum_provider(mut self, provider: impl ChecksumProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    /// Probe media with `probe`
    pub fn with_media_probe(mut self, probe: impl MediaProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Ask `gate` whether to continue after a connectivity loss
    pub fn with_resume_gate(mut self, gate: impl ResumeGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Report per-file progress
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The validated configuration
    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Checksum algorithm in use
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Load the history the next run would compare against
    pub fn history(&self) -> Result<HistorySnapshot> {
        let (root, inventory_dir) = self.existing_directories()?;
        HistorySnapshot::load(&inventory_dir, &utils::normalize_root_identifier(&root))
    }

    /// Path of the checkpoint file for this root
    pub fn checkpoint_path(&self) -> Result<PathBuf> {
        let (root, inventory_dir) = self.existing_directories()?;
        Ok(inventory_dir.join(utils::checkpoint_file_name(&utils::normalize_root_identifier(&root))))
    }

    /// Run the inventory, writing the result into the inventory directory
    ///
    /// # Errors
    ///
    /// - [`FixityError::HistoryParse`] if the prior inventory is unreadable
    /// - [`FixityError::CheckpointWrite`] if the checkpoint file cannot be
    ///   written or renamed
    /// - [`FixityError::Interrupted`] if the operator stops the run; the
    ///   checkpoint file is kept for the next run
    #[instrument(skip(self), fields(root = ?self.config.root_directory))]
    pub fn run(&mut self) -> Result<InventoryReport> {
        let started = utils::now_timestamp();
        let (root, inventory_dir) = self.resolve_directories()?;
        let normalized_root = utils::normalize_root_identifier(&root);
        let checkpoint_path = inventory_dir.join(utils::checkpoint_file_name(&normalized_root));

        info!("Inventory of {:?} started at {}", root, started);
        let history = HistorySnapshot::load(&inventory_dir, &normalized_root)?;
        let resume = ResumeState::load(&checkpoint_path)?;
        if !resume.is_empty() {
            warn!(
                "Found unfinished inventory {:?}; completing it ({} files already done)",
                checkpoint_path,
                resume.processed_paths.len()
            );
        }

        let mut sink = CsvInventorySink::new(checkpoint_path.clone());
        let mut report = self.execute_with(
            &root,
            &inventory_dir,
            &history,
            &resume,
            &mut sink,
            started,
            Some(checkpoint_path.clone()),
        )?;

        let final_path = inventory_dir.join(utils::final_file_name(&normalized_root, started));
        utils::finalize_file(&checkpoint_path, &final_path)
            .map_err(|e| FixityError::checkpoint_write(&final_path, e))?;
        info!("Inventory written to {:?}", final_path);

        report.inventory_path = Some(final_path);
        Ok(report)
    }

    /// Run the inventory into a caller-supplied sink
    ///
    /// History is still read from the inventory directory, but no checkpoint
    /// file is read or written.
    pub fn execute(&mut self, sink: &mut dyn RecordSink) -> Result<InventoryReport> {
        let started = utils::now_timestamp();
        let (root, inventory_dir) = self.resolve_directories()?;
        let history = HistorySnapshot::load(&inventory_dir, &utils::normalize_root_identifier(&root))?;
        self.execute_with(
            &root,
            &inventory_dir,
            &history,
            &ResumeState::default(),
            sink,
            started,
            None,
        )
    }

    /// Canonical root and inventory directory, creating the latter
    fn resolve_directories(&self) -> Result<(PathBuf, PathBuf)> {
        let root = fs::canonicalize(&self.config.root_directory)?;
        fs::create_dir_all(&self.config.inventory_directory)?;
        let inventory_dir = fs::canonicalize(&self.config.inventory_directory)?;
        Ok((root, inventory_dir))
    }

    /// Canonical root and inventory directory, without creating anything
    fn existing_directories(&self) -> Result<(PathBuf, PathBuf)> {
        let root = fs::canonicalize(&self.config.root_directory)?;
        let inventory_dir = match fs::canonicalize(&self.config.inventory_directory) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.config.inventory_directory.clone(),
            Err(e) => return Err(e.into()),
        };
        Ok((root, inventory_dir))
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_with(
        &mut self,
        root: &Path,
        inventory_dir: &Path,
        history: &HistorySnapshot,
        resume: &ResumeState,
        sink: &mut dyn RecordSink,
        started: NaiveDateTime,
        checkpoint_path: Option<PathBuf>,
    ) -> Result<InventoryReport> {
        let start = Instant::now();
        sink.begin()?;

        let mut selector = FileSelector::new(root.to_path_buf(), self.config.filter.clone())
            .with_follow_symlinks(self.config.follow_symlinks);
        if inventory_dir == root {
            let prefix = format!(
                "{}{}___",
                utils::INVENTORY_PREFIX,
                utils::normalize_root_identifier(root)
            );
            debug!("Inventories live in the root; skipping files named {}*", prefix);
            selector = selector.with_skip_file_prefix(prefix);
        } else if inventory_dir.starts_with(root) {
            debug!("Skipping inventory directory {:?} inside the root", inventory_dir);
            selector = selector.with_skip_dir(inventory_dir.to_path_buf());
        }
        let selection = selector.select()?;
        info!(
            "{} files to process, {} not selected",
            selection.total_selected, selection.total_excluded
        );

        let context = RunContext {
            root: root.to_path_buf(),
            algorithm: self.algorithm,
            checkpoint_interval: self.config.checkpoint_interval,
            validate_media: self.config.validate_media,
            started,
            checkpoint_path,
        };
        let outcome = CheckpointedRunner::new(
            &context,
            history,
            &*self.provider,
            &*self.probe,
            &mut *self.gate,
            &mut *sink,
        )
        .with_progress(self.progress.clone())
        .run(&selection, resume)?;

        let reconciliation = ReconciliationReporter::new(history).report(
            &outcome.matched,
            &selection.excluded,
            &outcome.missing_reported,
            &resume.reported_not_selected,
            utils::now_timestamp(),
        );
        sink.append(&reconciliation.records())?;

        Ok(InventoryReport {
            root: root.to_path_buf(),
            inventory_path: None,
            history_source: history.source().map(Path::to_path_buf),
            resumed: !resume.is_empty(),
            started,
            total_selected: selection.total_selected,
            total_excluded: selection.total_excluded,
            missing: reconciliation.missing.len(),
            not_selected: reconciliation.not_selected.len(),
            outcome,
            duration: start.elapsed(),
        })
    }
}
