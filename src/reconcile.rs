//! Reconciliation of the current file set against history
//!
//! After the per-file loop, every path the prior inventory listed must be
//! accounted for: processed this run, excluded by the filter, or reported
//! missing. The paths left over are the ones that disappeared.

use crate::history::HistorySnapshot;
use crate::types::InventoryRecord;
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Column values that are never real paths
const PLACEHOLDER_PATHS: [&str; 2] = ["", "FilePath"];

/// Records produced by reconciliation
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    /// One record per vanished path, sorted by path
    pub missing: Vec<InventoryRecord>,
    /// One record per excluded path, sorted by path
    pub not_selected: Vec<InventoryRecord>,
}

impl ReconciliationReport {
    /// Missing records followed by not-selected records
    pub fn records(&self) -> Vec<InventoryRecord> {
        self.missing
            .iter()
            .chain(self.not_selected.iter())
            .cloned()
            .collect()
    }

    /// Total records in the report
    pub fn len(&self) -> usize {
        self.missing.len() + self.not_selected.len()
    }

    /// True when there is nothing to append
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compares the historical path set with what this run saw
#[derive(Debug)]
pub struct ReconciliationReporter<'a> {
    history: &'a HistorySnapshot,
}

impl<'a> ReconciliationReporter<'a> {
    pub fn new(history: &'a HistorySnapshot) -> Self {
        Self { history }
    }

    /// Known paths neither matched, excluded nor already reported, sorted
    pub fn leftover(
        &self,
        matched: &HashSet<String>,
        excluded: &BTreeSet<String>,
        already_reported: &HashSet<String>,
    ) -> BTreeSet<String> {
        self.history
            .known_paths()
            .iter()
            .filter(|path| !PLACEHOLDER_PATHS.contains(&path.as_str()))
            .filter(|path| !matched.contains(*path) && !excluded.contains(*path))
            .filter(|path| !already_reported.contains(*path))
            .cloned()
            .collect()
    }

    /// Build the missing and not-selected records
    ///
    /// `reported_missing` and `reported_not_selected` hold paths that already
    /// have a marker row, either from the loop or from a resumed checkpoint;
    /// they get no second one.
    pub fn report(
        &self,
        matched: &HashSet<String>,
        excluded: &BTreeSet<String>,
        reported_missing: &HashSet<String>,
        reported_not_selected: &HashSet<String>,
        timestamp: NaiveDateTime,
    ) -> ReconciliationReport {
        let missing: Vec<InventoryRecord> = self
            .leftover(matched, excluded, reported_missing)
            .into_iter()
            .map(|path| {
                warn!("File is missing or cannot be accessed: {}", path);
                InventoryRecord::missing(&path, timestamp)
            })
            .collect();

        let not_selected: Vec<InventoryRecord> = excluded
            .iter()
            .filter(|path| !reported_not_selected.contains(*path))
            .map(|path| InventoryRecord::not_selected(path, timestamp))
            .collect();

        debug!(
            "Reconciliation: {} missing, {} not selected",
            missing.len(),
            not_selected.len()
        );
        ReconciliationReport {
            missing,
            not_selected,
        }
    }
}
