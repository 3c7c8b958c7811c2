//! Core data types used throughout fixity
//!
//! This module contains the data structures shared by the inventory
//! components.
//!
//! ## Overview
//!
//! - **Records**: [`InventoryRecord`] is one row of an inventory file, with
//!   its classification fields [`NewFileStatus`] and [`ChecksumStatus`]
//! - **Configuration values**: [`ChecksumAlgorithm`], [`FilterMode`]
//! - **Progress**: [`ProgressInfo`] passed to progress callbacks
//!
//! ## Inventory file layout
//!
//! Every row has the same eleven columns, named in [`INVENTORY_HEADER`]. The
//! file starts with a `sep=` directive so spreadsheet tools pick the backtick
//! delimiter, which keeps file paths containing commas intact.
//!
//! ```rust
//! use fixity::types::{ChecksumAlgorithm, NewFileStatus};
//!
//! let algorithm: ChecksumAlgorithm = "sha256".parse().unwrap();
//! assert_eq!(algorithm.to_string(), "SHA256");
//! assert_eq!(NewFileStatus::FirstSeen.label(), "First inventory of this file");
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Delimiter between inventory columns
pub const INVENTORY_DELIMITER: u8 = b'`';

/// Directive written on the first line of every inventory file
pub const SEPARATOR_DIRECTIVE: &str = "sep=`";

/// Canonical column names of an inventory file
pub const INVENTORY_HEADER: [&str; 11] = [
    "ProcessingTimeStamp",
    "FilePath",
    "RootDirectory",
    "FileName",
    "ProcessingError",
    "Checksum",
    "ChecksumType",
    "NewFile?",
    "ChecksumMatchesPast?",
    "ValidationErrors",
    "FileNumber",
];

/// Timestamp format used in records and inventory file names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%Hh%Mm%Ss";

/// Processing error recorded for paths that vanished since the last run
pub const MISSING_FILE_MARKER: &str = "File is missing or cannot be accessed";

/// Processing error recorded for paths skipped by the extension filter
pub const NOT_SELECTED_MARKER: &str = "Not selected";

/// Checksum algorithms supported by the default checksum provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChecksumAlgorithm {
    /// MD5, the default
    #[default]
    Md5,
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
}

impl ChecksumAlgorithm {
    /// All supported algorithms
    pub const ALL: [ChecksumAlgorithm; 3] = [
        ChecksumAlgorithm::Md5,
        ChecksumAlgorithm::Sha1,
        ChecksumAlgorithm::Sha256,
    ];

    /// Name written to the `ChecksumType` column
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "MD5",
            ChecksumAlgorithm::Sha1 => "SHA1",
            ChecksumAlgorithm::Sha256 => "SHA256",
        }
    }

    /// Parse an algorithm name, falling back to MD5 on anything unknown
    ///
    /// Returns the algorithm and whether the fallback was taken, so callers
    /// can tell the operator.
    pub fn parse_or_default(input: &str) -> (ChecksumAlgorithm, bool) {
        match input.parse() {
            Ok(algorithm) => (algorithm, false),
            Err(_) => (ChecksumAlgorithm::Md5, true),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let cleaned: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | '-'))
            .collect::<String>()
            .to_uppercase();
        match cleaned.as_str() {
            "MD5" => Ok(ChecksumAlgorithm::Md5),
            "SHA1" => Ok(ChecksumAlgorithm::Sha1),
            "SHA256" => Ok(ChecksumAlgorithm::Sha256),
            _ => Err(format!("unsupported checksum algorithm '{}'", s)),
        }
    }
}

/// Whether the extension list names the files to process or the files to skip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Process only files with a listed extension
    #[default]
    Include,
    /// Process every file except those with a listed extension
    Exclude,
}

/// Whether a path has been inventoried before
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NewFileStatus {
    /// The path does not appear in any earlier inventory of this root
    FirstSeen,
    /// The path was listed before, possibly only as missing
    NotNew,
    /// Classification did not happen (processing failed, or reconciliation row)
    #[default]
    Unclassified,
}

impl NewFileStatus {
    /// Text written to the `NewFile?` column
    pub fn label(&self) -> &'static str {
        match self {
            NewFileStatus::FirstSeen => "First inventory of this file",
            NewFileStatus::NotNew | NewFileStatus::Unclassified => "",
        }
    }
}

/// Outcome of comparing a checksum with the last recorded one for its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistoryMatch {
    /// No historical checksum to compare against
    #[default]
    NotApplicable,
    /// Same checksum as last time
    Consistent,
    /// Checksum changed since last time
    Inconsistent,
}

/// Checksum classification of a record
///
/// The duplicate flag and the history comparison are independent: a file can
/// be both a duplicate of another file in this run and inconsistent with its
/// own history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecksumStatus {
    /// Comparison against the prior inventory
    pub history: HistoryMatch,
    /// The checksum was already emitted earlier in this run
    pub duplicate_in_run: bool,
}

impl ChecksumStatus {
    /// Text written to the `ChecksumMatchesPast?` column
    pub fn label(&self) -> String {
        let mut label = String::new();
        if self.duplicate_in_run {
            label.push_str("Duplicate checksum.");
        }
        if self.history == HistoryMatch::Inconsistent {
            label.push_str("Inconsistent checksum.");
        }
        label
    }

    /// True if nothing about this checksum needs review
    pub fn is_clean(&self) -> bool {
        !self.duplicate_in_run && self.history != HistoryMatch::Inconsistent
    }
}

/// One row of an inventory
///
/// Created once per processed, missing or excluded file and never modified
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// When the file was processed (local time)
    pub timestamp: NaiveDateTime,
    /// Full path of the file
    pub full_path: String,
    /// Directory containing the file
    pub parent_dir: String,
    /// File name without directory
    pub file_name: String,
    /// Stage failure, missing marker or not-selected marker
    pub processing_error: Option<String>,
    /// Lowercase hex digest, empty when none was computed
    pub checksum: String,
    /// Algorithm name, empty when no checksum was attempted
    pub checksum_algorithm: String,
    /// Whether the path was seen in an earlier inventory
    pub is_new: NewFileStatus,
    /// Duplicate and history classification
    pub checksum_status: ChecksumStatus,
    /// Media validation failures, in rule order
    pub validation_errors: Vec<String>,
    /// Position in the run's selection order
    pub sequence_number: Option<u64>,
}

impl InventoryRecord {
    /// Start a record for `full_path`, splitting out directory and name
    pub fn for_path(full_path: &str, timestamp: NaiveDateTime) -> Self {
        let path = Path::new(full_path);
        let parent_dir = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            timestamp,
            full_path: full_path.to_string(),
            parent_dir,
            file_name,
            processing_error: None,
            checksum: String::new(),
            checksum_algorithm: String::new(),
            is_new: NewFileStatus::Unclassified,
            checksum_status: ChecksumStatus::default(),
            validation_errors: Vec::new(),
            sequence_number: None,
        }
    }

    /// Record for a path that appears in history but not on disk
    pub fn missing(full_path: &str, timestamp: NaiveDateTime) -> Self {
        let mut record = Self::for_path(full_path, timestamp);
        record.processing_error = Some(MISSING_FILE_MARKER.to_string());
        record
    }

    /// Record for a path skipped by the extension filter
    pub fn not_selected(full_path: &str, timestamp: NaiveDateTime) -> Self {
        let mut record = Self::for_path(full_path, timestamp);
        record.processing_error = Some(NOT_SELECTED_MARKER.to_string());
        record
    }

    /// True for the missing-file marker rows
    pub fn is_missing_marker(&self) -> bool {
        self.processing_error.as_deref() == Some(MISSING_FILE_MARKER)
    }

    /// Text written to the `ValidationErrors` column
    pub fn validation_summary(&self) -> String {
        if self.validation_errors.is_empty() {
            String::new()
        } else {
            format!(
                "{} Error(s): {}",
                self.validation_errors.len(),
                self.validation_errors.join(" ")
            )
        }
    }

    /// Render the record as the eleven inventory columns
    pub fn to_row(&self) -> [String; 11] {
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.full_path.clone(),
            self.parent_dir.clone(),
            self.file_name.clone(),
            self.processing_error.clone().unwrap_or_default(),
            self.checksum.clone(),
            self.checksum_algorithm.clone(),
            self.is_new.label().to_string(),
            self.checksum_status.label(),
            self.validation_summary(),
            self.sequence_number.map(|n| n.to_string()).unwrap_or_default(),
        ]
    }
}

/// Progress callback for long-running operations
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Information passed to progress callbacks
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Items processed so far
    pub processed: usize,
    /// Total items to process (if known)
    pub total: Option<usize>,
}

impl ProgressInfo {
    /// Get progress as a percentage (0-100)
    pub fn percentage(&self) -> Option<f32> {
        match self.total {
            Some(total) if total > 0 => Some((self.processed as f32 / total as f32) * 100.0),
            _ => None,
        }
    }
}
