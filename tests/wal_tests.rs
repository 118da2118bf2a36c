//! Tests for the write-ahead log
//!
//! These tests verify:
//! - Append and replay of length-prefixed records
//! - Recovery idempotence (same log, same rebuilt index)
//! - Tolerance of a torn trailing record
//! - Reset deleting the backing file
//! - Freeze renaming to the frozen extension

use std::io::{Seek, SeekFrom, Write};

use stratakv::entry::{Entry, Lookup};
use stratakv::wal::{parse_frozen_id, Wal};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_wal() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wal.log");
    (dir, path)
}

fn write_sample_records(path: &std::path::Path, count: usize) {
    let mut wal = Wal::open(path).unwrap();
    wal.recover().unwrap();
    for i in 0..count {
        let entry = Entry::new(format!("key{:04}", i), format!("value{}", i), i as u64);
        wal.append(&entry).unwrap();
    }
}

// =============================================================================
// Append / Recover Tests
// =============================================================================

#[test]
fn test_recover_rebuilds_entries() {
    let (_dir, path) = setup_wal();
    write_sample_records(&path, 50);

    // No clean shutdown above; reopen cold
    let mut wal = Wal::open(&path).unwrap();
    let list = wal.recover().unwrap();

    assert_eq!(list.len(), 50);
    for i in 0..50 {
        let key = format!("key{:04}", i);
        assert_eq!(
            list.search(key.as_bytes()),
            Lookup::Found(format!("value{}", i).into_bytes())
        );
    }
}

#[test]
fn test_recover_applies_tombstones() {
    let (_dir, path) = setup_wal();
    {
        let mut wal = Wal::open(&path).unwrap();
        wal.recover().unwrap();
        wal.append(&Entry::new("alive", "v", 1)).unwrap();
        wal.append(&Entry::new("doomed", "v", 2)).unwrap();
        wal.append(&Entry::tombstone("doomed", 3)).unwrap();
    }

    let mut wal = Wal::open(&path).unwrap();
    let list = wal.recover().unwrap();

    assert_eq!(list.search(b"alive"), Lookup::Found(b"v".to_vec()));
    assert_eq!(list.search(b"doomed"), Lookup::Deleted);
}

#[test]
fn test_recovery_is_idempotent() {
    let (_dir, path) = setup_wal();
    write_sample_records(&path, 30);

    let first: Vec<Entry> = Wal::open(&path).unwrap().recover().unwrap().iter().collect();
    let second: Vec<Entry> = Wal::open(&path).unwrap().recover().unwrap().iter().collect();

    assert_eq!(first.len(), 30);
    assert_eq!(first, second);
}

#[test]
fn test_append_continues_after_recover() {
    let (_dir, path) = setup_wal();
    write_sample_records(&path, 5);

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.recover().unwrap();
        wal.append(&Entry::new("key9999", "late", 99)).unwrap();
    }

    let mut wal = Wal::open(&path).unwrap();
    let list = wal.recover().unwrap();
    assert_eq!(list.len(), 6);
    assert_eq!(list.search(b"key9999"), Lookup::Found(b"late".to_vec()));
}

// =============================================================================
// Torn Record Tests
// =============================================================================

#[test]
fn test_torn_trailing_record_is_dropped() {
    let (_dir, path) = setup_wal();

    let valid_len = {
        let mut wal = Wal::open(&path).unwrap();
        wal.recover().unwrap();
        for i in 0..10 {
            wal.append(&Entry::new(format!("key{}", i), "v", i)).unwrap();
        }
        wal.len()
    };

    // Simulate a crash mid-write: a length prefix promising 100 bytes
    // followed by only a few bytes of payload
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap();
    file.seek(SeekFrom::Start(valid_len)).unwrap();
    file.write_all(&100u64.to_be_bytes()).unwrap();
    file.write_all(b"torn").unwrap();
    file.sync_all().unwrap();
    drop(file);

    let mut wal = Wal::open(&path).unwrap();
    let list = wal.recover().unwrap();
    assert_eq!(list.len(), 10);
    assert!(wal.len() >= valid_len);
    for i in 0..10 {
        let key = format!("key{}", i);
        assert_eq!(list.search(key.as_bytes()), Lookup::Found(b"v".to_vec()));
    }
}

#[test]
fn test_empty_log_recovers_empty() {
    let (_dir, path) = setup_wal();
    let mut wal = Wal::open(&path).unwrap();
    let list = wal.recover().unwrap();
    assert!(list.is_empty());
    assert!(wal.is_empty());
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_reset_deletes_file() {
    let (_dir, path) = setup_wal();
    write_sample_records(&path, 3);
    assert!(path.exists());

    let mut wal = Wal::open(&path).unwrap();
    wal.recover().unwrap();
    wal.reset().unwrap();
    assert!(!path.exists());

    // Writes after reset are refused
    assert!(wal.append(&Entry::new("k", "v", 1)).is_err());
}

#[test]
fn test_freeze_renames_to_frozen_extension() {
    let (dir, path) = setup_wal();
    write_sample_records(&path, 3);

    let mut wal = Wal::open(&path).unwrap();
    wal.recover().unwrap();
    let frozen = wal.freeze(7).unwrap();

    assert!(!path.exists());
    assert!(frozen.exists());
    assert_eq!(frozen.parent().unwrap(), dir.path());
    assert_eq!(parse_frozen_id(&frozen), Some(7));

    // Frozen logs replay like any other
    let mut wal = Wal::open(&frozen).unwrap();
    assert_eq!(wal.recover().unwrap().len(), 3);
}
