//! Append-only destinations for inventory records
//!
//! The runner hands records to a [`RecordSink`] in batches, once per
//! checkpoint. Sinks only ever append; nothing already written is rewritten,
//! so an interrupted run leaves a valid partial inventory behind.

use crate::error::{FixityError, Result};
use crate::types::{InventoryRecord, INVENTORY_DELIMITER, INVENTORY_HEADER, SEPARATOR_DIRECTIVE};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for inventory records
pub trait RecordSink {
    /// Prepare the sink before the first batch
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Append a batch of records; an empty batch is allowed
    fn append(&mut self, records: &[InventoryRecord]) -> Result<()>;
}

/// Writes records to the delimited inventory file
///
/// The file is opened in append mode for every batch and closed again, so
/// each flushed checkpoint is on disk before processing continues.
#[derive(Debug)]
pub struct CsvInventorySink {
    path: PathBuf,
    rows_written: u64,
}

impl CsvInventorySink {
    /// Sink appending to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            rows_written: 0,
        }
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this sink
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn open(&self) -> Result<fs::File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| FixityError::checkpoint_write(&self.path, e))
    }
}

impl RecordSink for CsvInventorySink {
    /// Write the directive and header unless the file already has content
    fn begin(&mut self) -> Result<()> {
        let has_content = fs::metadata(&self.path).map(|m| m.len() > 0).unwrap_or(false);
        if has_content {
            debug!("Appending to existing checkpoint file {:?}", self.path);
            return Ok(());
        }

        let mut file = self.open()?;
        let header = format!(
            "{}\n{}\n",
            SEPARATOR_DIRECTIVE,
            INVENTORY_HEADER.join(&(INVENTORY_DELIMITER as char).to_string())
        );
        file.write_all(header.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| FixityError::checkpoint_write(&self.path, e))
    }

    fn append(&mut self, records: &[InventoryRecord]) -> Result<()> {
        let file = self.open()?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(INVENTORY_DELIMITER)
            .quote_style(csv::QuoteStyle::Always)
            .has_headers(false)
            .from_writer(file);

        for record in records {
            writer
                .write_record(record.to_row())
                .map_err(|e| FixityError::checkpoint_write(&self.path, e.into()))?;
        }
        writer
            .flush()
            .map_err(|e| FixityError::checkpoint_write(&self.path, e))?;

        self.rows_written += records.len() as u64;
        debug!("Appended {} rows to {:?}", records.len(), self.path);
        Ok(())
    }
}

/// In-memory sink retaining records and batch sizes
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<InventoryRecord>,
    batches: Vec<usize>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record appended, in order
    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    /// Size of every batch appended, in order, empty batches included
    pub fn batches(&self) -> &[usize] {
        &self.batches
    }

    /// Record for `path`, if exactly one was appended
    pub fn record_for(&self, path: &str) -> Option<&InventoryRecord> {
        let mut matches = self.records.iter().filter(|r| r.full_path == path);
        match (matches.next(), matches.next()) {
            (Some(record), None) => Some(record),
            _ => None,
        }
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, records: &[InventoryRecord]) -> Result<()> {
        self.batches.push(records.len());
        self.records.extend_from_slice(records);
        Ok(())
    }
}
