//! Level Manager
//!
//! Owns the ordered sequence of levels (index 0 = newest data) and the
//! durable manifest of their table paths.
//!
//! ## Responsibilities
//! - Reopen every manifest-listed table on startup
//! - Cross-level search, newest level / newest table first
//! - Append flushed memtables to level 0
//! - Trigger and execute compaction when a level exceeds its bounds
//!
//! ## Concurrency
//! - `levels`: reader/writer lock — searches run concurrently, while
//!   appends and merges (which rewrite the table list and manifest) take
//!   the write side
//! - `manifest`: mutex, always acquired after the levels lock
//! - `next_table_id`: atomic counter (lock-free)

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::entry::{Entry, Lookup};
use crate::error::Result;

use super::compaction::merge_tables;
use super::manifest::Manifest;
use super::{Level, SSTable};

/// Manages the on-disk half of the tree.
pub struct LevelManager {
    /// Directory holding table files and the manifest
    sst_dir: PathBuf,

    /// Levels, index 0 = newest
    levels: RwLock<Vec<Level>>,

    /// Durable record of level membership
    manifest: Mutex<Manifest>,

    /// Next ID for naming new table files
    next_table_id: AtomicU64,

    /// Max table count per level before compaction
    part_size: usize,

    /// Per-level byte bounds
    level_sizes: Vec<u64>,

    /// Max entries per compacted output table
    split_threshold: usize,

    /// Bloom false-positive rate for new tables
    bloom_fp_rate: f64,
}

impl LevelManager {
    const MANIFEST_FILENAME: &'static str = "MANIFEST";
    const SST_DIR: &'static str = "sst";

    /// Open the manager under `config.data_dir`, reopening every table the
    /// manifest lists.
    ///
    /// A listed table that is missing or unreadable is logged and skipped;
    /// the engine keeps serving the rest.
    pub fn open(config: &Config) -> Result<Self> {
        let sst_dir = config.data_dir.join(Self::SST_DIR);
        std::fs::create_dir_all(&sst_dir)?;

        let manifest = Manifest::load(&sst_dir.join(Self::MANIFEST_FILENAME), config.max_levels)?;

        let mut levels = Vec::with_capacity(config.max_levels);
        let mut max_id = 0u64;
        let mut opened = 0usize;
        for paths in manifest.levels() {
            let mut level = Level::new();
            for path in paths {
                let path = Path::new(path);
                match SSTable::open(path) {
                    Ok(table) => {
                        level.push(table);
                        opened += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable SSTable");
                    }
                }
                if let Some(id) = parse_table_id(path) {
                    max_id = max_id.max(id);
                }
            }
            levels.push(level);
        }

        if opened > 0 {
            info!(tables = opened, "level manager reopened tables from manifest");
        }

        Ok(Self {
            sst_dir,
            levels: RwLock::new(levels),
            manifest: Mutex::new(manifest),
            next_table_id: AtomicU64::new(max_id + 1),
            part_size: config.part_size,
            level_sizes: config.level_sizes.clone(),
            split_threshold: config.threshold,
            bloom_fp_rate: config.bloom_fp_rate,
        })
    }

    /// Search all levels, newest first; within a level, newest table first.
    ///
    /// Stops at the first conclusive result: more recent writes (including
    /// deletes) always shadow older ones regardless of which level they
    /// physically reside in.
    pub fn search(&self, key: &[u8]) -> Result<Lookup> {
        let levels = self.levels.read();
        for level in levels.iter() {
            let result = level.search(key)?;
            if result.is_conclusive() {
                return Ok(result);
            }
        }
        Ok(Lookup::NotFound)
    }

    /// Write a sorted entry batch (one frozen memtable) as a new table
    /// appended to level 0, and make the change durable in the manifest.
    pub fn flush_to_level0(&self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let path = self.next_table_path(0);
        let table = SSTable::create(entries, &path, self.bloom_fp_rate)?;

        let mut levels = self.levels.write();
        levels[0].push(table);
        self.rewrite_manifest(&levels)?;
        info!(path = %path.display(), entries = entries.len(), "flushed memtable to level 0");
        Ok(())
    }

    /// Check every level against its bounds and compact the ones over.
    pub fn check_compaction(&self) -> Result<()> {
        for lv in 0..self.level_sizes.len() {
            let over = {
                let levels = self.levels.read();
                match levels.get(lv) {
                    Some(level) => self.needs_compaction(level, lv),
                    None => false,
                }
            };
            if over {
                self.merge(lv)?;
            }
        }
        Ok(())
    }

    fn needs_compaction(&self, level: &Level, lv: usize) -> bool {
        level.len() > self.part_size
            || self
                .level_sizes
                .get(lv)
                .is_some_and(|&bound| level.total_bytes() > bound)
    }

    /// Merge every table in `lv` into new tables appended to the next level
    /// (the last level compacts into itself).
    ///
    /// Crash-safety ordering: the new tables and the rewritten manifest are
    /// durable before any superseded file is deleted.
    pub fn merge(&self, lv: usize) -> Result<()> {
        let mut levels = self.levels.write();
        if lv >= levels.len() || levels[lv].len() < 2 {
            return Ok(());
        }
        let target = if lv + 1 < levels.len() { lv + 1 } else { lv };

        let merged = merge_tables(levels[lv].tables())?;
        debug!(
            level = lv,
            target,
            source_tables = levels[lv].len(),
            merged_entries = merged.len(),
            "compacting level"
        );

        // Split the run so no compacted table grows unbounded
        let mut new_tables = Vec::new();
        for chunk in merged.chunks(self.split_threshold.max(1)) {
            let path = self.next_table_path(target);
            new_tables.push(SSTable::create(chunk, &path, self.bloom_fp_rate)?);
        }

        let old_tables = levels[lv].take_tables();
        for table in new_tables {
            levels[target].push(table);
        }
        self.rewrite_manifest(&levels)?;

        let freed: u64 = old_tables.iter().map(|t| t.size()).sum();
        for table in old_tables {
            let path = table.path().to_path_buf();
            if let Err(e) = table.remove() {
                warn!(path = %path.display(), error = %e, "failed to remove compacted SSTable");
            }
        }
        info!(level = lv, target, freed_bytes = freed, "compaction finished");
        Ok(())
    }

    /// Total number of tables across all levels.
    pub fn table_count(&self) -> usize {
        self.levels.read().iter().map(|l| l.len()).sum()
    }

    /// Number of tables in one level.
    pub fn level_len(&self, lv: usize) -> usize {
        self.levels.read().get(lv).map(|l| l.len()).unwrap_or(0)
    }

    // Must be called with the levels write lock held
    fn rewrite_manifest(&self, levels: &[Level]) -> Result<()> {
        let mut manifest = self.manifest.lock();
        for (lv, level) in levels.iter().enumerate() {
            let paths = level
                .tables()
                .iter()
                .map(|t| t.path().to_string_lossy().into_owned())
                .collect();
            manifest.set_level(lv, paths);
        }
        manifest.sync()
    }

    fn next_table_path(&self, lv: usize) -> PathBuf {
        let id = self.next_table_id.fetch_add(1, Ordering::SeqCst);
        self.sst_dir.join(format!("sst_{}_{:06}.sst", lv, id))
    }
}

/// Parse the sequence ID from a table filename.
/// "sst_0_000042.sst" → Some(42)
fn parse_table_id(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let seq = stem.strip_prefix("sst_")?.split('_').nth(1)?;
    seq.parse().ok()
}
