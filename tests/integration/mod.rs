//! Multi-run integration tests for fixity
//!
//! Each test builds a tree in a temporary directory, runs one or more
//! inventories over it and inspects the inventory files written to disk.

use ::fixity::*;
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Column positions in an inventory row
const PATH: usize = 1;
const ERROR: usize = 4;
const CHECKSUM: usize = 5;
const NEW_FILE: usize = 7;
const MATCHES_PAST: usize = 8;
const VALIDATION: usize = 9;
const FILE_NUMBER: usize = 10;

/// Test harness holding a root tree and its inventory directory
pub struct FixityTestHarness {
    pub root_dir: TempDir,
    pub inventory_dir: TempDir,
}

impl FixityTestHarness {
    pub fn new() -> Self {
        Self {
            root_dir: TempDir::new().unwrap(),
            inventory_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> PathBuf {
        fs::canonicalize(self.root_dir.path()).unwrap()
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root_dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        self.root().join(relative)
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.root_dir.path().join(relative)).unwrap();
    }

    pub fn builder(&self) -> InventoryBuilder {
        InventoryBuilder::new()
    }

    pub fn inventory(&self, builder: InventoryBuilder) -> Inventory {
        builder
            .build(self.root_dir.path().to_path_buf(), self.inventory_dir.path().to_path_buf())
            .unwrap()
            .with_media_probe(|_: &Path| -> std::result::Result<MediaFields, MediaError> {
                Ok(MediaFields::new())
            })
    }

    /// Run with default settings and return the data rows of the result
    pub fn run(&self) -> (InventoryReport, Vec<Vec<String>>) {
        let report = self.inventory(self.builder()).run().unwrap();
        let rows = data_rows(report.inventory_path.as_ref().unwrap());
        (report, rows)
    }
}

impl Default for FixityTestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Rows of an inventory file without the directive and header
pub fn data_rows(path: &Path) -> Vec<Vec<String>> {
    history::read_inventory_rows(path)
        .unwrap()
        .into_iter()
        .skip(2)
        .collect()
}

fn row_for<'a>(rows: &'a [Vec<String>], path: &Path) -> &'a Vec<String> {
    let path = path.to_str().unwrap();
    let mut matching = rows.iter().filter(|r| r[PATH] == path);
    let row = matching.next().unwrap_or_else(|| panic!("no row for {}", path));
    assert!(matching.next().is_none(), "more than one row for {}", path);
    row
}

#[test]
fn test_first_run_everything_is_new() {
    let harness = FixityTestHarness::new();
    harness.write("a.txt", "alpha");
    harness.write("sub/b.txt", "beta");

    let (report, rows) = harness.run();

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r[NEW_FILE] == "First inventory of this file"));
    assert!(rows.iter().all(|r| r[MATCHES_PAST].is_empty()));
    assert!(rows.iter().all(|r| r.len() == 11));
    assert_eq!(rows[0][FILE_NUMBER], "1");
    assert_eq!(rows[1][FILE_NUMBER], "2");
    assert_eq!(report.outcome.first_seen, 2);
    assert!(report.is_clean());
}

#[test]
fn test_second_run_without_changes_is_consistent() {
    let harness = FixityTestHarness::new();
    let a = harness.write("a.txt", "alpha");
    harness.write("sub/b.txt", "beta");

    let (_, first) = harness.run();
    let (report, second) = harness.run();

    assert_eq!(report.outcome.consistent, 2);
    assert_eq!(report.outcome.first_seen, 0);
    assert_eq!(report.missing, 0);
    assert!(report.history_source.is_some());
    let row = row_for(&second, &a);
    assert_eq!(row[NEW_FILE], "");
    assert_eq!(row[MATCHES_PAST], "");

    // Same files, numbers and checksums; only the timestamps may differ
    assert_eq!(first.len(), second.len());
    for (left, right) in first.iter().zip(second.iter()) {
        assert_eq!(left[PATH..=6], right[PATH..=6]);
        assert_eq!(left[FILE_NUMBER], right[FILE_NUMBER]);
    }
}

#[test]
fn test_modified_file_is_inconsistent() {
    let harness = FixityTestHarness::new();
    let a = harness.write("a.txt", "alpha");
    harness.write("b.txt", "beta");
    harness.run();

    harness.write("a.txt", "alpha, silently corrupted");
    let (report, rows) = harness.run();

    assert_eq!(report.outcome.inconsistent, 1);
    assert_eq!(row_for(&rows, &a)[MATCHES_PAST], "Inconsistent checksum.");
    assert!(!report.is_clean());
}

#[test]
fn test_deleted_file_reported_missing_once() {
    let harness = FixityTestHarness::new();
    harness.write("a.txt", "alpha");
    let gone = harness.write("gone.txt", "soon gone");
    harness.run();

    harness.remove("gone.txt");
    let (report, rows) = harness.run();
    assert_eq!(report.missing, 1);
    let row = row_for(&rows, &gone);
    assert_eq!(row[ERROR], "File is missing or cannot be accessed");
    assert_eq!(row[CHECKSUM], "");
    assert_eq!(row[FILE_NUMBER], "");

    // Still listed in history, so still reported on the next run, once
    let (report, rows) = harness.run();
    assert_eq!(report.missing, 1);
    row_for(&rows, &gone);
}

#[test]
fn test_reappearing_file_is_not_new() {
    let harness = FixityTestHarness::new();
    let a = harness.write("a.txt", "alpha");
    harness.run();
    harness.remove("a.txt");
    harness.run();

    harness.write("a.txt", "alpha");
    let (_, rows) = harness.run();
    let row = row_for(&rows, &a);
    assert_eq!(row[NEW_FILE], "");
    // The last row for the path was the missing marker, which has no checksum
    assert_eq!(row[MATCHES_PAST], "");
}

#[test]
fn test_duplicates_flag_later_files_only() {
    let harness = FixityTestHarness::new();
    let first = harness.write("a/copy.txt", "same content");
    let second = harness.write("b/copy.txt", "same content");
    harness.write("c/other.txt", "different");

    let (report, rows) = harness.run();
    assert_eq!(report.outcome.duplicates, 1);
    assert_eq!(row_for(&rows, &first)[MATCHES_PAST], "");
    assert_eq!(row_for(&rows, &second)[MATCHES_PAST], "Duplicate checksum.");
}

#[test]
fn test_newly_excluded_file_is_not_missing() {
    let harness = FixityTestHarness::new();
    harness.write("a.tif", "image");
    let log = harness.write("b.log", "log");
    harness.run();

    let report = harness
        .inventory(harness.builder().filter(FilterMode::Exclude, ["log"]))
        .run()
        .unwrap();
    let rows = data_rows(report.inventory_path.as_ref().unwrap());

    assert_eq!(report.missing, 0);
    assert_eq!(report.not_selected, 1);
    assert_eq!(row_for(&rows, &log)[ERROR], "Not selected");
}

#[test]
fn test_algorithm_column_and_sha256() {
    let harness = FixityTestHarness::new();
    let a = harness.write("a.txt", "hello world");

    let report = harness
        .inventory(harness.builder().algorithm(ChecksumAlgorithm::Sha256))
        .run()
        .unwrap();
    let rows = data_rows(report.inventory_path.as_ref().unwrap());
    let row = row_for(&rows, &a);
    assert_eq!(row[6], "SHA256");
    assert_eq!(
        row[CHECKSUM],
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
}

#[test]
fn test_media_validation_written_to_inventory() {
    let harness = FixityTestHarness::new();
    let wav = harness.write("take.wav", "not really audio");
    let tif = harness.write("scan.tif", "not really an image");

    let probe = |path: &Path| -> std::result::Result<MediaFields, MediaError> {
        if path.extension().is_some_and(|e| e == "wav") {
            Ok(MediaFields::new()
                .with("FileExtension", "wav")
                .with("Format/Extensions", "aiff aif")
                .with("SamplingRate", "22050"))
        } else {
            Ok(MediaFields::new()
                .with("FileExtension", "tif")
                .with("Format/Extensions", "tiff tif"))
        }
    };
    let report = harness
        .builder()
        .build(harness.root_dir.path().to_path_buf(), harness.inventory_dir.path().to_path_buf())
        .unwrap()
        .with_media_probe(probe)
        .run()
        .unwrap();
    let rows = data_rows(report.inventory_path.as_ref().unwrap());

    assert_eq!(
        row_for(&rows, &wav)[VALIDATION],
        "2 Error(s): File extension not expected value. Sampling rate is incorrect."
    );
    assert_eq!(row_for(&rows, &tif)[VALIDATION], "");
    assert_eq!(report.outcome.validation_failures, 1);
}

/// Gate that inspects the checkpoint file at the moment of the pause
struct InspectingGate {
    checkpoint: PathBuf,
    rows_at_pause: Rc<Cell<usize>>,
}

impl ResumeGate for InspectingGate {
    fn wait_for_resume(&mut self, _path: &Path, _reason: &str) -> ResumeDecision {
        self.rows_at_pause
            .set(history::read_inventory_rows(&self.checkpoint).unwrap().len());
        ResumeDecision::Retry
    }
}

#[test]
fn test_connectivity_loss_persists_work_before_pausing() {
    let harness = FixityTestHarness::new();
    harness.write("1.txt", "one");
    harness.write("2.txt", "two");
    harness.write("3.txt", "three");

    let dropped = Cell::new(false);
    let provider = move |path: &Path, algorithm: ChecksumAlgorithm| {
        if path.ends_with("3.txt") && !dropped.replace(true) {
            return Err(ChecksumError::Unavailable("share went away".to_string()));
        }
        DigestChecksumProvider::new().checksum(path, algorithm)
    };

    let inventory = harness.inventory(harness.builder());
    let checkpoint = inventory.checkpoint_path().unwrap();
    let rows_at_pause = Rc::new(Cell::new(0));
    let mut inventory = inventory
        .with_checksum_provider(provider)
        .with_resume_gate(InspectingGate {
            checkpoint,
            rows_at_pause: Rc::clone(&rows_at_pause),
        });

    let report = inventory.run().unwrap();

    // Directive, header and the two files hashed before the outage
    assert_eq!(rows_at_pause.get(), 4);
    assert_eq!(report.outcome.processed, 3);
    assert_eq!(report.outcome.failed, 0);
}

#[test]
fn test_checkpoint_interval_does_not_change_result() {
    let harness = FixityTestHarness::new();
    for i in 0..25 {
        harness.write(&format!("dir{}/file{:02}.txt", i % 3, i), &format!("content {}", i));
    }

    let small = harness
        .inventory(harness.builder().checkpoint_interval(4))
        .run()
        .unwrap();
    // Index 0 and every fourth file after it, plus the final flush
    assert_eq!(small.outcome.flushes, 8);

    let rows_small = data_rows(small.inventory_path.as_ref().unwrap());
    let large = harness
        .inventory(harness.builder().checkpoint_interval(1_000))
        .run()
        .unwrap();
    let rows_large = data_rows(large.inventory_path.as_ref().unwrap());

    assert_eq!(large.outcome.flushes, 2);
    let paths = |rows: &[Vec<String>]| rows.iter().map(|r| r[PATH].clone()).collect::<Vec<_>>();
    assert_eq!(paths(&rows_small), paths(&rows_large));
}
