//! Run configuration
//!
//! [`InventoryConfig`] is plain data that can be read from a JSON file;
//! [`InventoryBuilder`] is the fluent way to assemble one in code and turn it
//! into an [`Inventory`].
//!
//! ```json
//! {
//!   "root_directory": "/data/box1",
//!   "inventory_directory": "/data/inventories",
//!   "checksum_algorithm": "SHA256",
//!   "filter": { "mode": "exclude", "extensions": ["log", "tmp"] },
//!   "checkpoint_interval": 5000
//! }
//! ```

use crate::error::{FixityError, Result};
use crate::inventory::Inventory;
use crate::runner::DEFAULT_CHECKPOINT_INTERVAL;
use crate::selection::FileFilter;
use crate::types::{ChecksumAlgorithm, FilterMode};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

fn default_algorithm() -> String {
    ChecksumAlgorithm::default().to_string()
}

fn default_interval() -> usize {
    DEFAULT_CHECKPOINT_INTERVAL
}

fn default_true() -> bool {
    true
}

/// Everything an inventory run needs to know
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Directory tree to inventory
    pub root_directory: PathBuf,
    /// Where checkpoint and finished inventories are written
    pub inventory_directory: PathBuf,
    /// Algorithm name; anything unrecognized falls back to MD5
    #[serde(default = "default_algorithm")]
    pub checksum_algorithm: String,
    /// Extension filter
    #[serde(default)]
    pub filter: FileFilter,
    /// Files processed between checkpoints
    #[serde(default = "default_interval")]
    pub checkpoint_interval: usize,
    /// Whether image and audio files are probed and validated
    #[serde(default = "default_true")]
    pub validate_media: bool,
    /// Whether symbolic links are followed during selection
    #[serde(default)]
    pub follow_symlinks: bool,
    /// `mediainfo` executable to run instead of the one on `PATH`
    #[serde(default)]
    pub mediainfo_program: Option<String>,
}

impl InventoryConfig {
    /// Configuration with defaults for everything but the two directories
    pub fn new(root_directory: PathBuf, inventory_directory: PathBuf) -> Self {
        Self {
            root_directory,
            inventory_directory,
            checksum_algorithm: default_algorithm(),
            filter: FileFilter::all(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            validate_media: true,
            follow_symlinks: false,
            mediainfo_program: None,
        }
    }

    /// Read a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject configurations that cannot produce a meaningful inventory
    ///
    /// Nothing is read from disk beyond checking that the root exists.
    pub fn validate(&self) -> Result<()> {
        if !self.root_directory.is_dir() {
            return Err(FixityError::config(format!(
                "root directory {:?} does not exist or is not a directory",
                self.root_directory
            )));
        }
        if self.inventory_directory.as_os_str().is_empty() {
            return Err(FixityError::config("inventory directory must be set"));
        }
        if self.checkpoint_interval == 0 {
            return Err(FixityError::config("checkpoint interval must be at least 1"));
        }
        self.filter.validate()
    }

    /// Algorithm to use, warning when the configured name is not recognized
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        let (algorithm, fell_back) = ChecksumAlgorithm::parse_or_default(&self.checksum_algorithm);
        if fell_back {
            warn!(
                "Unsupported checksum algorithm '{}', using {}",
                self.checksum_algorithm, algorithm
            );
        }
        algorithm
    }

    /// Root identifier embedded in inventory file names
    pub fn normalized_root(&self) -> String {
        utils::normalize_root_identifier(&self.root_directory)
    }
}

/// Builder for configuring an [`Inventory`]
///
/// # Examples
///
/// ```rust,no_run
/// use fixity::{ChecksumAlgorithm, FilterMode, InventoryBuilder};
/// use std::path::PathBuf;
///
/// # fn main() -> fixity::Result<()> {
/// let mut inventory = InventoryBuilder::new()
///     .algorithm(ChecksumAlgorithm::Sha256)
///     .filter(FilterMode::Exclude, ["log", "tmp"])
///     .checkpoint_interval(5_000)
///     .build(PathBuf::from("/data/box1"), PathBuf::from("/data/inventories"))?;
/// let report = inventory.run()?;
/// println!("{} files inventoried", report.outcome.processed);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InventoryBuilder {
    algorithm: String,
    filter: FileFilter,
    checkpoint_interval: usize,
    validate_media: bool,
    follow_symlinks: bool,
    mediainfo_program: Option<String>,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self {
            algorithm: default_algorithm(),
            filter: FileFilter::all(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            validate_media: true,
            follow_symlinks: false,
            mediainfo_program: None,
        }
    }

    /// Set the checksum algorithm
    pub fn algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.algorithm = algorithm.to_string();
        self
    }

    /// Set the checksum algorithm by name, falling back to MD5 when unknown
    pub fn algorithm_name(mut self, name: impl Into<String>) -> Self {
        self.algorithm = name.into();
        self
    }

    /// Set the extension filter
    pub fn filter<I, S>(mut self, mode: FilterMode, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter = FileFilter::new(mode, extensions);
        self
    }

    /// Set the number of files between checkpoints
    pub fn checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Enable or disable media validation
    pub fn validate_media(mut self, enabled: bool) -> Self {
        self.validate_media = enabled;
        self
    }

    /// Set symbolic link following behavior
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Run a specific `mediainfo` executable
    pub fn mediainfo_program(mut self, program: impl Into<String>) -> Self {
        self.mediainfo_program = Some(program.into());
        self
    }

    /// Finish into a configuration without validating it
    pub fn into_config(self, root_directory: PathBuf, inventory_directory: PathBuf) -> InventoryConfig {
        InventoryConfig {
            root_directory,
            inventory_directory,
            checksum_algorithm: self.algorithm,
            filter: self.filter,
            checkpoint_interval: self.checkpoint_interval,
            validate_media: self.validate_media,
            follow_symlinks: self.follow_symlinks,
            mediainfo_program: self.mediainfo_program,
        }
    }

    /// Validate the configuration and create the [`Inventory`]
    ///
    /// # Errors
    ///
    /// - [`FixityError::InvalidConfiguration`] when the root does not exist,
    ///   the interval is zero, or the filter would exclude every file
    pub fn build(self, root_directory: PathBuf, inventory_directory: PathBuf) -> Result<Inventory> {
        Inventory::new(self.into_config(root_directory, inventory_directory))
    }
}

impl Default for InventoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
