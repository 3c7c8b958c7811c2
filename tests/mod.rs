//! Main test module for fixity
//!
//! This module includes all test suites:
//! - Integration tests for multi-run scenarios
//! - Property-based tests for invariants
//! - Edge cases for unusual trees and file names

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::fixity::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn no_probe(_: &Path) -> std::result::Result<MediaFields, MediaError> {
        Ok(MediaFields::new())
    }

    fn inventory(root: &Path, inv: &Path) -> Inventory {
        InventoryBuilder::new()
            .build(root.to_path_buf(), inv.to_path_buf())
            .unwrap()
            .with_media_probe(no_probe)
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let inv_dir = TempDir::new().unwrap();

        let report = inventory(temp_dir.path(), inv_dir.path()).run().unwrap();
        assert_eq!(report.total_selected, 0);
        assert_eq!(report.outcome.records_written, 0);
        assert!(report.is_clean());

        // Still a valid inventory: directive and header only
        let rows = history::read_inventory_rows(&report.inventory_path.unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], INVENTORY_HEADER.to_vec());
    }

    #[test]
    fn test_special_filenames() {
        let temp_dir = TempDir::new().unwrap();
        let inv_dir = TempDir::new().unwrap();

        // Delimiter, quotes and commas must survive the inventory format
        let special_names = vec![
            "file with spaces.txt",
            "file,with,commas.txt",
            "file`with`backticks.txt",
            "file\"with\"quotes.txt",
            "file'with'apostrophes.txt",
            "file(with)parens.txt",
        ];

        let mut created = Vec::new();
        for name in &special_names {
            let path = temp_dir.path().join(name);
            if fs::write(&path, format!("Content of {}", name)).is_ok() {
                created.push(*name);
            }
        }

        let report = inventory(temp_dir.path(), inv_dir.path()).run().unwrap();
        assert_eq!(report.outcome.processed, created.len());

        let rows = history::read_inventory_rows(&report.inventory_path.unwrap()).unwrap();
        for name in &created {
            assert!(
                rows.iter().any(|r| r[3] == *name),
                "{} not found intact in the inventory",
                name
            );
        }

        // A second run reads those names back and finds every file unchanged
        let second = inventory(temp_dir.path(), inv_dir.path()).run().unwrap();
        assert_eq!(second.outcome.consistent, created.len());
        assert_eq!(second.missing, 0);
    }

    #[test]
    fn test_unicode_filenames() {
        let temp_dir = TempDir::new().unwrap();
        let inv_dir = TempDir::new().unwrap();

        let unicode_names = vec!["файл.txt", "文件.txt", "ファイル.txt", "αρχείο.txt", "🚀🌟💾.txt"];
        let mut created = 0;
        for name in &unicode_names {
            if fs::write(temp_dir.path().join(name), name.as_bytes()).is_ok() {
                created += 1;
            }
        }
        if created == 0 {
            return;
        }

        let report = inventory(temp_dir.path(), inv_dir.path()).run().unwrap();
        assert_eq!(report.outcome.first_seen, created);
        assert_eq!(report.outcome.failed, 0);
    }

    #[test]
    fn test_empty_files_share_a_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let inv_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "").unwrap();
        fs::write(temp_dir.path().join("b.txt"), "").unwrap();

        let report = inventory(temp_dir.path(), inv_dir.path()).run().unwrap();
        // Zero-length files hash to the same value and are flagged like any other
        assert_eq!(report.outcome.duplicates, 1);
    }

    #[test]
    fn test_deep_nesting() {
        let temp_dir = TempDir::new().unwrap();
        let inv_dir = TempDir::new().unwrap();

        let mut path = temp_dir.path().to_path_buf();
        for i in 0..40 {
            path = path.join(format!("level{}", i));
        }
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("deep.txt"), "deep").unwrap();

        let report = inventory(temp_dir.path(), inv_dir.path()).run().unwrap();
        assert_eq!(report.outcome.processed, 1);
        assert_eq!(report.outcome.failed, 0);
    }

    #[test]
    fn test_root_that_is_a_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not_a_dir.txt");
        fs::write(&file, "x").unwrap();

        let err = InventoryBuilder::new()
            .build(file, temp_dir.path().join("inv"))
            .unwrap_err();
        assert!(matches!(err, FixityError::InvalidConfiguration(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_recorded_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let inv_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked.txt");
        fs::write(&locked, "secret").unwrap();
        fs::write(temp_dir.path().join("open.txt"), "open").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; nothing to check in that case
        if fs::read(&locked).is_ok() {
            return;
        }

        let report = inventory(temp_dir.path(), inv_dir.path()).run().unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(report.outcome.failed, 1);
        assert_eq!(report.outcome.processed, 2);
        let rows = history::read_inventory_rows(&report.inventory_path.unwrap()).unwrap();
        let row = rows.iter().find(|r| r[3] == "locked.txt").unwrap();
        assert_eq!(row[4], "Error in processing while calculating checksum");
        assert_eq!(row[5], "");
    }
}
