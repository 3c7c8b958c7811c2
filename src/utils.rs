//! Utility functions for fixity
//!
//! Naming helpers for inventory files, timestamp handling and small path
//! conversions shared by the loader, the selector and the runner.
//!
//! ## Inventory file names
//!
//! The target root directory is embedded in the inventory file name so an
//! inventory stays identifiable when it is copied elsewhere:
//!
//! ```text
//! __Inventory_'data'collections'box1___TEMPINVENTORY.csv       (checkpoint)
//! __Inventory_'data'collections'box1___2024-03-09_14h05m07s.csv (final)
//! ```

use crate::types::TIMESTAMP_FORMAT;
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::path::Path;
use tracing::trace;

/// Prefix shared by every inventory file
pub const INVENTORY_PREFIX: &str = "__Inventory_";

/// Suffix that marks the in-progress checkpoint file
pub const CHECKPOINT_SUFFIX: &str = "TEMPINVENTORY";

/// Character substituted for path separators in file names
const SEPARATOR_SUBSTITUTE: char = '\'';

/// Turn a root directory into a string that can live inside a file name
///
/// Strips the Windows verbatim prefix and replaces `/`, `\` and the drive
/// colon with `'`.
pub fn normalize_root_identifier(root: &Path) -> String {
    let raw = root.to_string_lossy();
    let trimmed = raw.strip_prefix(r"\\?\").unwrap_or(&raw);
    let trimmed = if trimmed.len() > 1 {
        trimmed.trim_end_matches(['/', '\\'])
    } else {
        trimmed
    };
    trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => SEPARATOR_SUBSTITUTE,
            other => other,
        })
        .collect()
}

/// File name of the checkpoint file for a normalized root
pub fn checkpoint_file_name(normalized_root: &str) -> String {
    format!("{}{}___{}.csv", INVENTORY_PREFIX, normalized_root, CHECKPOINT_SUFFIX)
}

/// File name of a finished inventory for a normalized root
pub fn final_file_name(normalized_root: &str, started: NaiveDateTime) -> String {
    format!(
        "{}{}___{}.csv",
        INVENTORY_PREFIX,
        normalized_root,
        started.format(TIMESTAMP_FORMAT)
    )
}

/// Extract the run timestamp from a finished inventory file name
///
/// Returns `None` for checkpoint files, inventories of other roots, or
/// anything that does not follow the naming convention.
pub fn parse_inventory_file_name(file_name: &str, normalized_root: &str) -> Option<NaiveDateTime> {
    let rest = file_name
        .strip_prefix(INVENTORY_PREFIX)?
        .strip_prefix(normalized_root)?
        .strip_prefix("___")?
        .strip_suffix(".csv")?;
    NaiveDateTime::parse_from_str(rest, TIMESTAMP_FORMAT).ok()
}

/// Current local time truncated to whole seconds
pub fn now_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    NaiveDateTime::parse_from_str(&now.format(TIMESTAMP_FORMAT).to_string(), TIMESTAMP_FORMAT)
        .unwrap_or(now)
}

/// Lowercased extension of a file name, without the dot
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Normalize a user-supplied extension: trim, drop leading dots, lowercase
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Rename the checkpoint file to its final name
///
/// Uses a plain rename, which is atomic when both names live in the same
/// directory.
pub fn finalize_file(from: &Path, to: &Path) -> std::io::Result<()> {
    trace!("Renaming {:?} -> {:?}", from, to);
    fs::rename(from, to)
}
