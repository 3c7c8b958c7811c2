//! Prior inventories
//!
//! An inventory run compares every file against the most recent finished
//! inventory of the same root directory. [`HistorySnapshot`] holds what that
//! comparison needs:
//!
//! - `path_to_checksum`: last recorded checksum per path (a later row for the
//!   same path wins)
//! - `known_paths`: every path listed at all, including paths that were only
//!   recorded as missing or not selected
//!
//! [`ResumeState`] reads the checkpoint file left behind by an interrupted run
//! so the next run can complete it instead of starting over.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fixity::history::HistorySnapshot;
//! use std::path::Path;
//!
//! # fn main() -> fixity::Result<()> {
//! let history = HistorySnapshot::load(Path::new("/inventories"), "'data'box1")?;
//! if history.is_first_run() {
//!     println!("No earlier inventory; every file will be reported as new");
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{FixityError, Result};
use crate::types::{INVENTORY_DELIMITER, INVENTORY_HEADER, MISSING_FILE_MARKER, NOT_SELECTED_MARKER};
use crate::utils;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, trace};

/// Column index of the file path
const PATH_COLUMN: usize = 1;
/// Column index of the processing error
const ERROR_COLUMN: usize = 4;
/// Column index of the checksum
const CHECKSUM_COLUMN: usize = 5;
/// Column index of the sequence number
const SEQUENCE_COLUMN: usize = 10;
/// Rows shorter than this carry only a path (missing-file rows of older files)
const FULL_ROW_MIN_COLUMNS: usize = 5;

/// Lookup structures built from the latest prior inventory
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    source: Option<PathBuf>,
    path_to_checksum: HashMap<String, String>,
    known_paths: HashSet<String>,
    rows: Vec<Vec<String>>,
}

impl HistorySnapshot {
    /// Snapshot for a root that has never been inventoried
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the most recent inventory of `normalized_root` from `inventory_dir`
    ///
    /// A missing directory or no matching file yields an empty snapshot. Only
    /// an existing file that is not valid text is an error.
    pub fn load(inventory_dir: &Path, normalized_root: &str) -> Result<Self> {
        match find_latest_inventory(inventory_dir, normalized_root)? {
            Some(path) => {
                let rows = read_inventory_rows(&path)?;
                let snapshot = Self::from_rows(Some(path), rows);
                info!(
                    "Loaded prior inventory {:?}: {} known paths, {} checksums",
                    snapshot.source,
                    snapshot.known_paths.len(),
                    snapshot.path_to_checksum.len()
                );
                Ok(snapshot)
            }
            None => {
                info!("No prior inventory for {} in {:?}", normalized_root, inventory_dir);
                Ok(Self::empty())
            }
        }
    }

    /// Build a snapshot from already-parsed rows
    ///
    /// The `sep=` directive and the header row are skipped wherever they
    /// appear.
    pub fn from_rows(source: Option<PathBuf>, rows: Vec<Vec<String>>) -> Self {
        let mut path_to_checksum = HashMap::new();
        let mut known_paths = HashSet::new();

        for row in rows.iter().filter(|row| is_data_row(row)) {
            let path = &row[PATH_COLUMN];
            if row.len() >= FULL_ROW_MIN_COLUMNS {
                match row.get(CHECKSUM_COLUMN).map(|c| c.trim()) {
                    Some(checksum) if !checksum.is_empty() => {
                        path_to_checksum.insert(path.clone(), checksum.to_string());
                    }
                    _ => trace!("No checksum recorded for {}", path),
                }
            }
            known_paths.insert(path.clone());
        }

        Self {
            source,
            path_to_checksum,
            known_paths,
            rows,
        }
    }

    /// True when no prior inventory was found
    pub fn is_first_run(&self) -> bool {
        self.source.is_none()
    }

    /// Inventory file the snapshot was read from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Last recorded checksum for `path`
    pub fn checksum_for(&self, path: &str) -> Option<&str> {
        self.path_to_checksum.get(path).map(String::as_str)
    }

    /// Whether `path` was listed in the prior inventory at all
    pub fn is_known(&self, path: &str) -> bool {
        self.known_paths.contains(path)
    }

    /// Every path listed in the prior inventory
    pub fn known_paths(&self) -> &HashSet<String> {
        &self.known_paths
    }

    /// Number of paths with a recorded checksum
    pub fn checksum_count(&self) -> usize {
        self.path_to_checksum.len()
    }

    /// Raw rows as read, directive and header included
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Work already done by an interrupted run, read from its checkpoint file
#[derive(Debug, Clone, Default)]
pub struct ResumeState {
    /// Paths that already have a processed row
    pub processed_paths: HashSet<String>,
    /// Checksums already emitted, for duplicate detection
    pub checksums: HashSet<String>,
    /// Paths already reported missing
    pub reported_missing: HashSet<String>,
    /// Paths already reported as not selected
    pub reported_not_selected: HashSet<String>,
    /// Highest sequence number written
    pub last_sequence: Option<u64>,
}

impl ResumeState {
    /// Read the checkpoint file at `path`, if there is one
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let state = Self::from_rows(&read_inventory_rows(path)?);
        info!(
            "Resuming from {:?}: {} files already processed",
            path,
            state.processed_paths.len()
        );
        Ok(state)
    }

    /// Collect processed rows, checksums and markers
    pub fn from_rows(rows: &[Vec<String>]) -> Self {
        let mut state = Self::default();
        for row in rows.iter().filter(|row| is_data_row(row)) {
            let path = row[PATH_COLUMN].clone();
            let sequence = row.get(SEQUENCE_COLUMN).and_then(|s| s.parse::<u64>().ok());
            match row.get(ERROR_COLUMN).map(String::as_str) {
                Some(MISSING_FILE_MARKER) => {
                    // A numbered marker means the file vanished mid-run; it has its row
                    if sequence.is_some() {
                        state.last_sequence = state.last_sequence.max(sequence);
                        state.processed_paths.insert(path.clone());
                    }
                    state.reported_missing.insert(path);
                }
                Some(NOT_SELECTED_MARKER) => {
                    state.reported_not_selected.insert(path);
                }
                _ => {
                    if let Some(checksum) = row.get(CHECKSUM_COLUMN).filter(|c| !c.is_empty()) {
                        state.checksums.insert(checksum.clone());
                    }
                    state.last_sequence = state.last_sequence.max(sequence);
                    state.processed_paths.insert(path);
                }
            }
        }
        state
    }

    /// True when there is nothing to resume
    pub fn is_empty(&self) -> bool {
        self.processed_paths.is_empty()
            && self.reported_missing.is_empty()
            && self.reported_not_selected.is_empty()
    }
}

/// Find the most recently modified finished inventory of `normalized_root`
pub fn find_latest_inventory(inventory_dir: &Path, normalized_root: &str) -> Result<Option<PathBuf>> {
    let entries = match fs::read_dir(inventory_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut latest: Option<(SystemTime, chrono::NaiveDateTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(started) = utils::parse_inventory_file_name(name, normalized_root) else {
            continue;
        };
        let modified = entry.metadata()?.modified()?;
        trace!("Candidate inventory {} (modified {:?})", name, modified);

        let newer = match &latest {
            Some((best_modified, best_started, _)) => {
                (modified, started) > (*best_modified, *best_started)
            }
            None => true,
        };
        if newer {
            latest = Some((modified, started, entry.path()));
        }
    }

    let latest = latest.map(|(_, _, path)| path);
    debug!("Latest inventory for {}: {:?}", normalized_root, latest);
    Ok(latest)
}

/// Read every row of an inventory file
///
/// Rows may have any number of columns; quoting follows the usual CSV rules
/// with a backtick delimiter.
pub fn read_inventory_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(INVENTORY_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| FixityError::HistoryParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Rows that describe a file, as opposed to the directive or the header
fn is_data_row(row: &[String]) -> bool {
    match row.get(PATH_COLUMN) {
        None => false,
        Some(path) => {
            !path.is_empty()
                && path != INVENTORY_HEADER[PATH_COLUMN]
                && !row[0].starts_with("sep=")
        }
    }
}
