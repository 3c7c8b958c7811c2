//! File selection for an inventory run
//!
//! This module enumerates the files under a root directory and splits them
//! into the files to process and the files skipped by the extension filter.
//!
//! ## Filter rules
//!
//! A [`FileFilter`] has a mode and a set of extensions:
//!
//! - **Include**: only files with a listed extension are processed
//! - **Exclude**: every file except those with a listed extension is processed
//! - **Empty set**: every file is processed, but only in include mode;
//!   excluding "nothing listed" would exclude everything and is rejected
//!
//! Extensions are compared case-insensitively against the end of the file
//! name, so `tif` matches `scan.TIF` but not `motif`.
//!
//! ## Ordering
//!
//! Entries are visited depth-first with each directory's children sorted by
//! file name. Sequence numbers are assigned in that order starting at 1, so
//! two runs over an unchanged tree number files identically.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fixity::selection::{FileFilter, FileSelector};
//! use fixity::types::FilterMode;
//! use std::path::PathBuf;
//!
//! # fn main() -> fixity::Result<()> {
//! let filter = FileFilter::new(FilterMode::Include, ["tif", "wav"]);
//! let selection = FileSelector::new(PathBuf::from("/data/box1"), filter).select()?;
//! println!("{} to process, {} skipped", selection.total_selected, selection.total_excluded);
//! # Ok(())
//! # }
//! ```

use crate::error::{FixityError, Result};
use crate::types::FilterMode;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};
use walkdir::WalkDir;

/// Extension-based include/exclude filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFileFilter")]
pub struct FileFilter {
    /// Whether the extensions name files to keep or files to skip
    pub mode: FilterMode,
    /// Lowercase extensions without a leading dot
    pub extensions: BTreeSet<String>,
}

/// Filter as written in a configuration file, before normalization
#[derive(Deserialize)]
struct RawFileFilter {
    #[serde(default)]
    mode: FilterMode,
    #[serde(default)]
    extensions: Vec<String>,
}

impl From<RawFileFilter> for FileFilter {
    fn from(raw: RawFileFilter) -> Self {
        FileFilter::new(raw.mode, raw.extensions)
    }
}

impl FileFilter {
    /// Create a filter, normalizing the extensions
    pub fn new<I, S>(mode: FilterMode, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| utils::normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { mode, extensions }
    }

    /// Filter selecting every file
    pub fn all() -> Self {
        Self::default()
    }

    /// Reject filters that would select nothing by construction
    pub fn validate(&self) -> Result<()> {
        if self.mode == FilterMode::Exclude && self.extensions.is_empty() {
            return Err(FixityError::config(
                "exclude mode needs at least one extension; excluding every file is not allowed",
            ));
        }
        Ok(())
    }

    /// Whether `file_name` ends with one of the listed extensions
    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.extensions.iter().any(|ext| {
            lower
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
        })
    }

    /// Whether `file_name` should be processed
    pub fn selects(&self, file_name: &str) -> bool {
        self.extensions.is_empty() || self.matches(file_name) == (self.mode == FilterMode::Include)
    }
}

/// Result of enumerating a root directory
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Files to process, keyed by 1-based sequence number
    pub selected: BTreeMap<u64, String>,
    /// Files skipped by the filter or that could not be evaluated
    pub excluded: BTreeSet<String>,
    /// Number of selected files
    pub total_selected: usize,
    /// Number of excluded files
    pub total_excluded: usize,
}

/// Enumerates a directory tree and applies a [`FileFilter`]
#[derive(Debug)]
pub struct FileSelector {
    /// Root directory to enumerate
    root_path: PathBuf,
    /// Extension filter
    filter: FileFilter,
    /// Directories never descended into (the inventory directory)
    skip_dirs: Vec<PathBuf>,
    /// File name prefixes never selected or excluded (the tool's own output)
    skip_prefixes: Vec<String>,
    /// Whether to follow symbolic links during traversal
    follow_symlinks: bool,
}

impl FileSelector {
    /// Create a selector for `root_path`
    pub fn new(root_path: PathBuf, filter: FileFilter) -> Self {
        Self {
            root_path,
            filter,
            skip_dirs: Vec::new(),
            skip_prefixes: Vec::new(),
            follow_symlinks: false,
        }
    }

    /// Never descend into `dir`
    ///
    /// Used for the inventory directory when it lives inside the root, so
    /// inventories do not inventory themselves.
    pub fn with_skip_dir(mut self, dir: PathBuf) -> Self {
        self.skip_dirs.push(dir);
        self
    }

    /// Ignore files whose name starts with `prefix`
    ///
    /// Used when inventories are written into the root itself.
    pub fn with_skip_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.skip_prefixes.push(prefix.into());
        self
    }

    /// Set symbolic link following behavior
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Enumerate the root and split files into selected and excluded
    ///
    /// # Errors
    ///
    /// - [`FixityError::InvalidConfiguration`] for an exclude filter with no
    ///   extensions, before anything is read from disk
    ///
    /// Unreadable entries never fail the enumeration; they are excluded and
    /// logged.
    #[instrument(skip(self), fields(root = ?self.root_path))]
    pub fn select(&self) -> Result<Selection> {
        self.filter.validate()?;

        let start = Instant::now();
        info!("Determining files to process in {:?}", self.root_path);

        let mut selection = Selection::default();
        let mut sequence = 0u64;
        let skip_dirs = &self.skip_dirs;

        let walker = WalkDir::new(&self.root_path)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !skip_dirs.iter().any(|dir| entry.path() == dir));

        for entry_result in walker {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error determining files to process: {}", e);
                    // Directories are never inventoried, not even as excluded
                    let is_dir = e.path().is_some_and(Path::is_dir);
                    if let (Some(path), false) = (e.path(), is_dir) {
                        selection.excluded.insert(path.to_string_lossy().into_owned());
                    }
                    continue;
                }
            };

            if entry.file_type().is_dir() || (entry.path_is_symlink() && entry.path().is_dir()) {
                continue;
            }

            let path = entry.path();
            let (Some(name), Some(full_path)) = (entry.file_name().to_str(), path.to_str()) else {
                warn!("Error determining files to process: name is not valid UTF-8: {:?}", path);
                selection.excluded.insert(path.to_string_lossy().into_owned());
                continue;
            };

            if self.skip_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
                debug!("Skipping inventory file {}", full_path);
                continue;
            }

            if self.filter.selects(name) {
                sequence += 1;
                trace!("Selected #{} {}", sequence, full_path);
                selection.selected.insert(sequence, full_path.to_string());
            } else {
                trace!("Not selected {}", full_path);
                selection.excluded.insert(full_path.to_string());
            }
        }

        selection.total_selected = selection.selected.len();
        selection.total_excluded = selection.excluded.len();

        debug!(
            "Selected {} files, excluded {} in {:?}",
            selection.total_selected,
            selection.total_excluded,
            start.elapsed()
        );
        Ok(selection)
    }

    /// Root directory being enumerated
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}
