//! Property-based testing for fixity
//!
//! Uses proptest to check the classification, selection and reconciliation
//! rules over generated inputs.

use ::fixity::*;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Checksums drawn from a small alphabet so repeats are common
fn checksum_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-c]{1,2}".prop_map(|s| s),
        1 => Just(String::new()),
    ]
}

fn extension_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("tif".to_string()),
        Just("wav".to_string()),
        Just("txt".to_string()),
        "[a-z]{1,4}".prop_map(|s| s),
    ]
}

fn file_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        ("[a-z]{1,8}", extension_strategy()).prop_map(|(stem, ext)| format!("{}.{}", stem, ext)),
        ("[a-z]{1,8}", extension_strategy()).prop_map(|(stem, ext)| format!("{}.{}", stem, ext.to_uppercase())),
        "[a-z]{1,10}".prop_map(|s| s),
    ]
}

fn path_set_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("/data/[a-e]{1,2}", 0..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Exactly the repeats of a non-empty checksum are flagged
    #[test]
    fn prop_duplicates_are_later_repeats(checksums in prop::collection::vec(checksum_strategy(), 0..40)) {
        let history = HistorySnapshot::empty();
        let mut classifier = ChecksumClassifier::new(&history);
        let mut seen = HashSet::new();

        for (i, checksum) in checksums.iter().enumerate() {
            let result = classifier.classify(&format!("/data/{}", i), checksum);
            let expected = !checksum.is_empty() && !seen.insert(checksum.clone());
            prop_assert_eq!(result.status.duplicate_in_run, expected);
            prop_assert_eq!(result.is_new, NewFileStatus::FirstSeen);
        }

        let distinct: HashSet<_> = checksums.iter().filter(|c| !c.is_empty()).collect();
        prop_assert_eq!(classifier.distinct_checksums(), distinct.len());
    }

    /// A path compared with its own recorded checksum is consistent regardless of case
    #[test]
    fn prop_history_comparison_ignores_case(checksum in "[0-9a-f]{8,32}") {
        let rows = vec![vec![
            "ts".to_string(),
            "/data/a".to_string(),
            "/data".to_string(),
            "a".to_string(),
            String::new(),
            checksum.to_uppercase(),
        ]];
        let history = HistorySnapshot::from_rows(None, rows);
        let mut classifier = ChecksumClassifier::new(&history);

        let result = classifier.classify("/data/a", &checksum);
        prop_assert_eq!(result.is_new, NewFileStatus::NotNew);
        prop_assert_eq!(result.status.history, HistoryMatch::Consistent);

        let changed = classifier.classify("/data/a", &format!("{}0", checksum));
        prop_assert_eq!(changed.status.history, HistoryMatch::Inconsistent);
    }

    /// Include and exclude modes partition files the same way
    #[test]
    fn prop_include_and_exclude_are_complements(
        name in file_name_strategy(),
        extensions in prop::collection::btree_set(extension_strategy(), 1..4),
    ) {
        let include = FileFilter::new(FilterMode::Include, &extensions);
        let exclude = FileFilter::new(FilterMode::Exclude, &extensions);
        prop_assert_ne!(include.selects(&name), exclude.selects(&name));

        let lower = name.to_lowercase();
        let expected = extensions.iter().any(|ext| lower.ends_with(&format!(".{}", ext)));
        prop_assert_eq!(include.matches(&name), expected);
    }

    /// An empty include filter selects every name
    #[test]
    fn prop_empty_include_selects_all(name in file_name_strategy()) {
        prop_assert!(FileFilter::all().selects(&name));
    }

    /// Leftover paths are known paths nobody accounted for
    #[test]
    fn prop_leftover_is_set_difference(
        known in path_set_strategy(),
        matched in path_set_strategy(),
        excluded in path_set_strategy(),
        reported in path_set_strategy(),
    ) {
        let rows = known
            .iter()
            .map(|p| vec!["ts".to_string(), p.clone(), "/data".to_string(), "x".to_string(), String::new(), "abc".to_string()])
            .collect();
        let history = HistorySnapshot::from_rows(None, rows);
        let matched: HashSet<String> = matched.into_iter().collect();
        let reported: HashSet<String> = reported.into_iter().collect();

        let leftover = ReconciliationReporter::new(&history).leftover(&matched, &excluded, &reported);

        for path in &known {
            let accounted = matched.contains(path) || excluded.contains(path) || reported.contains(path);
            prop_assert_eq!(leftover.contains(path), !accounted);
        }
        prop_assert!(leftover.iter().all(|p| known.contains(p)));

        let report = ReconciliationReporter::new(&history).report(
            &matched,
            &excluded,
            &reported,
            &HashSet::new(),
            utils::now_timestamp(),
        );
        let missing: Vec<_> = report.missing.iter().map(|r| r.full_path.clone()).collect();
        prop_assert_eq!(missing, leftover.into_iter().collect::<Vec<_>>());
        prop_assert_eq!(report.not_selected.len(), excluded.len());
    }

    /// Root identifiers never contain path separators
    #[test]
    fn prop_root_identifier_has_no_separators(segments in prop::collection::vec("[a-zA-Z0-9 _.-]{1,8}", 1..6)) {
        let root = format!("/{}", segments.join("/"));
        let normalized = utils::normalize_root_identifier(Path::new(&root));
        prop_assert!(!normalized.contains('/'));
        prop_assert!(!normalized.contains('\\'));
        prop_assert!(!normalized.contains(':'));
        let checkpoint = utils::checkpoint_file_name(&normalized);
        prop_assert!(utils::parse_inventory_file_name(&checkpoint, &normalized).is_none());
    }
}
