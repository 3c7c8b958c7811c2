//! Error types for fixity
//!
//! This module defines the errors that can stop an inventory run. Checksum
//! mismatches, duplicate checksums and failed media checks are deliberately
//! absent: those are classification outcomes recorded in the inventory, not
//! failures.
//!
//! Collaborator failures (hashing, media probing) have their own small error
//! types in [`crate::checksum`] and [`crate::media`] because the runner
//! recovers from them per file instead of propagating them.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the fixity library
pub type Result<T> = std::result::Result<T, FixityError>;

/// Main error type for all fixity operations
#[derive(Debug, Error)]
pub enum FixityError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors while reading a JSON configuration file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors from the delimited inventory reader or writer
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Invalid configuration, rejected before any file is scanned
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A prior inventory exists but could not be decoded
    #[error("Cannot read prior inventory {path:?}: {reason}")]
    HistoryParse {
        /// Inventory file that failed to parse
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The checkpoint file could not be written or finalized
    #[error("Cannot write checkpoint {path:?}: {source}")]
    CheckpointWrite {
        /// Checkpoint or final inventory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The operator declined to resume after a connectivity loss
    #[error("Run interrupted: {0}")]
    Interrupted(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FixityError {
    /// Create a configuration error with a custom message
    pub fn config(msg: impl Into<String>) -> Self {
        FixityError::InvalidConfiguration(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        FixityError::Internal(msg.into())
    }

    /// Wrap an I/O error raised while writing the checkpoint file
    pub fn checkpoint_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FixityError::CheckpointWrite {
            path: path.into(),
            source,
        }
    }

    /// Check if a later run can pick up where this one stopped
    ///
    /// An interrupted run leaves its checkpoint file behind, so the next run
    /// resumes from it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FixityError::Interrupted(_))
    }

    /// Check if this error ends the run without a usable partial inventory
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FixityError::CheckpointWrite { .. } | FixityError::Internal(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            FixityError::InvalidConfiguration(msg) => {
                format!("{}. Fix the options and run again; no files were scanned.", msg)
            }
            FixityError::CheckpointWrite { path, .. } => {
                format!(
                    "Could not write {:?}. Check free space and permissions on the inventory directory.",
                    path
                )
            }
            FixityError::Interrupted(_) => {
                "Run stopped by the operator. The checkpoint file was kept; the next run will resume from it.".to_string()
            }
            FixityError::HistoryParse { path, .. } => {
                format!(
                    "The prior inventory {:?} is not valid UTF-8 text. Move it aside to start a fresh history.",
                    path
                )
            }
            _ => self.to_string(),
        }
    }
}
