//! Tests for the SSTable implementation
//!
//! These tests verify:
//! - Create/open round trip (values, tombstones, versions)
//! - Binary-search lookups and the tri-state result
//! - Min/max key range filtering and bloom pre-checks
//! - Footer validation on open
//! - Wholesale file removal

use std::path::PathBuf;

use stratakv::entry::{Entry, Lookup};
use stratakv::storage::SSTable;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_sstable() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.sst");
    (temp_dir, path)
}

/// Build a sorted entry batch with numbered keys
fn numbered_entries(count: usize) -> Vec<Entry> {
    (0..count)
        .map(|i| Entry::new(format!("key{:05}", i), format!("value{}", i), i as u64))
        .collect()
}

// =============================================================================
// Create / Open Round Trip
// =============================================================================

#[test]
fn test_round_trip_preserves_every_entry() {
    let (_temp, path) = setup_temp_sstable();
    let entries = numbered_entries(500);

    SSTable::create(&entries, &path, 0.01).unwrap();
    let table = SSTable::open(&path).unwrap();

    assert_eq!(table.entry_count(), 500);
    for entry in &entries {
        assert_eq!(
            table.get(&entry.key).unwrap(),
            Lookup::Found(entry.value.clone())
        );
    }
}

#[test]
fn test_round_trip_preserves_tombstones_and_versions() {
    let (_temp, path) = setup_temp_sstable();
    let entries = vec![
        Entry::new("apple", "red", 10),
        Entry::tombstone("banana", 11),
        Entry::new("cherry", "dark", 12),
    ];

    SSTable::create(&entries, &path, 0.01).unwrap();
    let table = SSTable::open(&path).unwrap();

    assert_eq!(table.get(b"apple").unwrap(), Lookup::Found(b"red".to_vec()));
    assert_eq!(table.get(b"banana").unwrap(), Lookup::Deleted);
    assert_eq!(table.get(b"cherry").unwrap(), Lookup::Found(b"dark".to_vec()));

    // entry_at reconstructs the original entries, versions included
    for (i, expected) in entries.iter().enumerate() {
        assert_eq!(&table.entry_at(i).unwrap(), expected);
    }
}

#[test]
fn test_create_rejects_empty_batch() {
    let (_temp, path) = setup_temp_sstable();
    assert!(SSTable::create(&[], &path, 0.01).is_err());
}

#[test]
fn test_min_max_keys_cached() {
    let (_temp, path) = setup_temp_sstable();
    let entries = numbered_entries(10);

    let table = SSTable::create(&entries, &path, 0.01).unwrap();
    assert_eq!(table.min_key(), b"key00000");
    assert_eq!(table.max_key(), b"key00009");

    let reopened = SSTable::open(&path).unwrap();
    assert_eq!(reopened.min_key(), b"key00000");
    assert_eq!(reopened.max_key(), b"key00009");
}

// =============================================================================
// Lookup Behavior
// =============================================================================

#[test]
fn test_lookup_misses_cleanly() {
    let (_temp, path) = setup_temp_sstable();
    let table = SSTable::create(&numbered_entries(100), &path, 0.01).unwrap();

    assert_eq!(table.get(b"key00100").unwrap(), Lookup::NotFound);
    assert_eq!(table.get(b"aaa").unwrap(), Lookup::NotFound);
}

#[test]
fn test_may_contain_excludes_out_of_range_keys() {
    let (_temp, path) = setup_temp_sstable();
    let table = SSTable::create(&numbered_entries(100), &path, 0.01).unwrap();

    assert!(!table.may_contain(b"aaa"));
    assert!(!table.may_contain(b"zzz"));
    assert!(table.may_contain(b"key00050"));
}

#[test]
fn test_may_contain_has_no_false_negatives() {
    let (_temp, path) = setup_temp_sstable();
    let entries = numbered_entries(1000);
    let table = SSTable::create(&entries, &path, 0.01).unwrap();

    for entry in &entries {
        assert!(table.may_contain(&entry.key));
    }
}

#[test]
fn test_empty_values_round_trip() {
    let (_temp, path) = setup_temp_sstable();
    let entries = vec![Entry::new("empty", "", 1), Entry::new("full", "x", 2)];

    SSTable::create(&entries, &path, 0.01).unwrap();
    let table = SSTable::open(&path).unwrap();
    assert_eq!(table.get(b"empty").unwrap(), Lookup::Found(Vec::new()));
    assert_eq!(table.get(b"full").unwrap(), Lookup::Found(b"x".to_vec()));
}

// =============================================================================
// Validation / Lifecycle
// =============================================================================

#[test]
fn test_open_rejects_truncated_file() {
    let (_temp, path) = setup_temp_sstable();
    std::fs::write(&path, b"tiny").unwrap();
    assert!(SSTable::open(&path).is_err());
}

#[test]
fn test_open_rejects_garbage_footer() {
    let (_temp, path) = setup_temp_sstable();
    std::fs::write(&path, vec![0xABu8; 256]).unwrap();
    assert!(SSTable::open(&path).is_err());
}

#[test]
fn test_remove_deletes_file() {
    let (_temp, path) = setup_temp_sstable();
    let table = SSTable::create(&numbered_entries(5), &path, 0.01).unwrap();
    assert!(path.exists());

    table.remove().unwrap();
    assert!(!path.exists());
}
