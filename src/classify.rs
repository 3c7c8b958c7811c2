//! Checksum classification against history and against the current run
//!
//! For each file the classifier answers two independent questions:
//!
//! - **Has this checksum already been emitted in this run?** The first file
//!   with a given checksum is clean; the second and later ones are flagged
//!   as duplicates. Files are never renamed or merged.
//! - **How does it compare with the prior inventory?** A path that was never
//!   listed is first seen. A listed path is not new, and its checksum is
//!   compared with the last one recorded for it, if any.
//!
//! Neither a duplicate nor a changed checksum is an error.

use crate::checksum::{ChecksumError, ChecksumProvider, ResumeDecision, ResumeGate};
use crate::error::{FixityError, Result};
use crate::history::HistorySnapshot;
use crate::types::{ChecksumAlgorithm, ChecksumStatus, HistoryMatch, NewFileStatus};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Classification of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Checksum that was classified
    pub checksum: String,
    /// Whether the path was seen before
    pub is_new: NewFileStatus,
    /// Duplicate flag and history comparison
    pub status: ChecksumStatus,
}

/// Classifies checksums for one run
///
/// Holds the set of checksums emitted so far, which spans the whole run
/// rather than only the records not yet flushed.
#[derive(Debug)]
pub struct ChecksumClassifier<'a> {
    history: &'a HistorySnapshot,
    seen: HashSet<String>,
}

impl<'a> ChecksumClassifier<'a> {
    /// Create a classifier consulting `history`
    pub fn new(history: &'a HistorySnapshot) -> Self {
        Self {
            history,
            seen: HashSet::new(),
        }
    }

    /// Treat `checksums` as already emitted (resumed runs)
    pub fn seed<I: IntoIterator<Item = String>>(&mut self, checksums: I) {
        self.seen
            .extend(checksums.into_iter().filter(|c| !c.is_empty()));
    }

    /// Number of distinct checksums emitted so far
    pub fn distinct_checksums(&self) -> usize {
        self.seen.len()
    }

    /// Hash `path`, pausing for the operator when storage is unavailable
    ///
    /// On [`ChecksumError::Unavailable`], `persist` is called to flush
    /// everything accumulated so far, then `gate` decides whether to retry the
    /// same file. Per-file failures are returned in the inner `Result`.
    ///
    /// # Errors
    ///
    /// - Any error from `persist`
    /// - [`FixityError::Interrupted`] when the gate declines to resume
    pub fn compute_checksum(
        &self,
        provider: &dyn ChecksumProvider,
        gate: &mut dyn ResumeGate,
        path: &Path,
        algorithm: ChecksumAlgorithm,
        persist: &mut dyn FnMut() -> Result<()>,
    ) -> Result<std::result::Result<String, ChecksumError>> {
        loop {
            match provider.checksum(path, algorithm) {
                Err(ChecksumError::Unavailable(reason)) => {
                    warn!("Lost access while hashing {:?}: {}", path, reason);
                    persist()?;
                    match gate.wait_for_resume(path, &reason) {
                        ResumeDecision::Retry => {
                            info!("Resuming with {:?}", path);
                        }
                        ResumeDecision::Abort => {
                            return Err(FixityError::Interrupted(format!(
                                "storage unavailable while hashing {}: {}",
                                path.display(),
                                reason
                            )));
                        }
                    }
                }
                other => return Ok(other.map(|c| c.trim().to_lowercase())),
            }
        }
    }

    /// Classify a computed checksum for `path`
    pub fn classify(&mut self, path: &str, checksum: &str) -> Classification {
        let mut status = ChecksumStatus::default();

        if !checksum.is_empty() && !self.seen.insert(checksum.to_string()) {
            status.duplicate_in_run = true;
            warn!("Checksum appears more than once: {} ({})", path, checksum);
        }

        let is_new = if self.history.is_known(path) {
            status.history = match self.history.checksum_for(path) {
                Some(previous) if previous.trim().eq_ignore_ascii_case(checksum) => {
                    HistoryMatch::Consistent
                }
                Some(previous) => {
                    warn!(
                        "Checksum does not match: {} (was {}, now {})",
                        path, previous, checksum
                    );
                    HistoryMatch::Inconsistent
                }
                None => {
                    debug!("{} was listed before without a checksum", path);
                    HistoryMatch::NotApplicable
                }
            };
            NewFileStatus::NotNew
        } else {
            NewFileStatus::FirstSeen
        };

        Classification {
            checksum: checksum.to_string(),
            is_new,
            status,
        }
    }
}
