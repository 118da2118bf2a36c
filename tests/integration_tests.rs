//! End-to-end integration tests
//!
//! Drives the whole engine through realistic write/read/delete/restart
//! cycles, with thresholds low enough that data crosses every layer:
//! memtable → frozen queue → level 0 → compacted levels.

use std::time::Duration;

use stratakv::{Config, Engine};
use tempfile::TempDir;

fn scenario_config(dir: &TempDir) -> Config {
    Config::builder()
        .data_dir(dir.path())
        .threshold(2000)
        .max_levels(4)
        .part_size(2)
        .level_sizes(vec![u64::MAX; 4])
        .check_interval(Duration::from_millis(50))
        .build()
}

#[test]
fn test_full_write_read_delete_cycle() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(scenario_config(&dir)).unwrap();

    // Insert key0..key9999 with values equal to their key bytes
    for i in 0..10_000u64 {
        let key = format!("key{}", i);
        engine.put(key.as_bytes(), key.as_bytes(), i).unwrap();
    }
    engine.flush().unwrap();

    // Every key reads back exactly
    for i in 0..10_000u64 {
        let key = format!("key{}", i);
        assert_eq!(
            engine.get(key.as_bytes()).unwrap(),
            Some(key.clone().into_bytes()),
            "{} mismatched after load",
            key
        );
    }

    // Delete the first hundred
    for i in 0..100u64 {
        let key = format!("key{}", i);
        engine.delete(key.as_bytes(), 10_000 + i).unwrap();
    }
    engine.flush().unwrap();

    // Deleted keys are absent, the rest intact — regardless of which level
    // each key ended up in
    for i in 0..10_000u64 {
        let key = format!("key{}", i);
        let got = engine.get(key.as_bytes()).unwrap();
        if i < 100 {
            assert_eq!(got, None, "{} resurrected after delete", key);
        } else {
            assert_eq!(got, Some(key.clone().into_bytes()), "{} lost", key);
        }
    }

    engine.close().unwrap();
}

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let engine = Engine::open(scenario_config(&dir)).unwrap();
        for i in 0..5_000u64 {
            let key = format!("key{}", i);
            engine.put(key.as_bytes(), key.as_bytes(), i).unwrap();
        }
        for i in 0..50u64 {
            let key = format!("key{}", i);
            engine.delete(key.as_bytes(), 5_000 + i).unwrap();
        }
        engine.close().unwrap();
    }

    let engine = Engine::open(scenario_config(&dir)).unwrap();
    for i in 0..5_000u64 {
        let key = format!("key{}", i);
        let got = engine.get(key.as_bytes()).unwrap();
        if i < 50 {
            assert_eq!(got, None, "{} resurrected after restart", key);
        } else {
            assert_eq!(got, Some(key.clone().into_bytes()), "{} lost after restart", key);
        }
    }
    engine.close().unwrap();
}

#[test]
fn test_compaction_happens_under_load() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .threshold(100)
        .max_levels(4)
        .part_size(2)
        .level_sizes(vec![u64::MAX; 4])
        .check_interval(Duration::from_millis(20))
        .build();
    let engine = Engine::open(config).unwrap();

    for i in 0..2_000u64 {
        let key = format!("key{:04}", i);
        engine.put(key.as_bytes(), key.as_bytes(), i).unwrap();
    }
    engine.flush().unwrap();

    // 20 flushed tables against a part_size of 2: compaction must have
    // pushed data below level 0
    let deeper: usize = (1..4).map(|lv| engine.level_len(lv)).sum();
    assert!(deeper > 0, "no tables ever left level 0");

    for i in 0..2_000u64 {
        let key = format!("key{:04}", i);
        assert_eq!(
            engine.get(key.as_bytes()).unwrap(),
            Some(key.clone().into_bytes()),
            "{} lost under compaction",
            key
        );
    }
    engine.close().unwrap();
}
