//! # Fixity - Checksum inventories for preservation storage
//!
//! Builds a checksum inventory of a directory tree and compares it with the
//! previous inventory of the same tree, so silent corruption, unexpected
//! changes and vanished files are noticed.
//!
//! ## Overview
//!
//! Each run produces one inventory file listing every file under the root:
//! - Its checksum (MD5, SHA-1 or SHA-256)
//! - Whether it was inventoried before
//! - Whether its checksum changed since last time, or repeats the checksum of
//!   another file in the same run
//! - Technical metadata problems for image and audio files
//!
//! Files that were listed last time but are gone now get a missing-file
//! record; files skipped by the extension filter get a not-selected record.
//!
//! ## Architecture
//!
//! - **History**: the latest finished inventory of the root, read into
//!   lookup tables
//! - **Selection**: deterministic, filtered enumeration of the root
//! - **Classification**: duplicate and history checks per checksum
//! - **Checkpointed runner**: the per-file loop, flushing records to an
//!   append-only sink every N files so an interrupted run can be resumed
//! - **Reconciliation**: the missing and not-selected records
//!
//! Hashing, media probing and the operator prompt after a connectivity loss
//! are traits ([`ChecksumProvider`], [`MediaProbe`], [`ResumeGate`]) with
//! default implementations, so tests and embedders can substitute their own.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fixity::{FilterMode, InventoryBuilder};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut inventory = InventoryBuilder::new()
//!     .filter(FilterMode::Exclude, ["tmp", "db"])
//!     .build(
//!         PathBuf::from("/mnt/preservation/box1"),
//!         PathBuf::from("/mnt/preservation/inventories"),
//!     )?;
//!
//! let report = inventory.run()?;
//! println!(
//!     "{} files, {} changed, {} missing",
//!     report.outcome.processed, report.outcome.inconsistent, report.missing
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Operations return `Result<T, FixityError>`. Changed checksums, duplicates
//! and failed media checks are never errors; they are recorded in the
//! inventory. A file that cannot be read is recorded with a processing error
//! and the run continues. Only invalid configuration, an unwritable
//! checkpoint file, or an operator stopping the run end it early.
//!
//! ## Module Organization
//!
//! - [`config`]: run configuration and builder
//! - [`inventory`]: top-level run orchestration
//! - [`history`]: prior inventories and interrupted-run state
//! - [`selection`]: file enumeration and extension filters
//! - [`checksum`]: hashing and the connectivity pause
//! - [`classify`]: duplicate and history classification
//! - [`media`]: technical metadata validation
//! - [`runner`]: the checkpointed per-file loop
//! - [`reconcile`]: missing and not-selected records
//! - [`sink`]: inventory file writer
//! - [`types`]: records and shared types
//! - [`error`]: error types

pub mod checksum;
pub mod classify;
pub mod config;
pub mod error;
pub mod history;
pub mod inventory;
pub mod media;
pub mod reconcile;
pub mod runner;
pub mod selection;
pub mod sink;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use checksum::{
    AutoResume, ChecksumError, ChecksumProvider, DigestChecksumProvider, ResumeDecision,
    ResumeGate, StdinResumeGate,
};
pub use classify::{ChecksumClassifier, Classification};
pub use config::{InventoryBuilder, InventoryConfig};
pub use error::{FixityError, Result};
pub use history::{HistorySnapshot, ResumeState};
pub use inventory::{Inventory, InventoryReport};
pub use media::{MediaError, MediaFields, MediaInfoProbe, MediaProbe};
pub use reconcile::{ReconciliationReport, ReconciliationReporter};
pub use runner::{CheckpointedRunner, ProcessingStage, RunContext, RunOutcome};
pub use selection::{FileFilter, FileSelector, Selection};
pub use sink::{CsvInventorySink, MemorySink, RecordSink};
pub use types::*;
