//! Configuration for stratakv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a stratakv engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal/             (active + frozen write-ahead logs)
    ///     └── sst/             (SSTable files + MANIFEST)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max number of entries in the active memtable before it is frozen
    /// and queued for flushing
    pub threshold: usize,

    // -------------------------------------------------------------------------
    // Level Configuration
    // -------------------------------------------------------------------------
    /// Number of levels in the tree
    pub max_levels: usize,

    /// Max number of SSTables per level before the level is compacted
    pub part_size: usize,

    /// Per-level cumulative byte bounds; a level exceeding its bound is
    /// compacted into the next
    pub level_sizes: Vec<u64>,

    // -------------------------------------------------------------------------
    // Background Task Configuration
    // -------------------------------------------------------------------------
    /// How often the background task re-evaluates flush/compaction thresholds
    pub check_interval: Duration,

    // -------------------------------------------------------------------------
    // Bloom Filter Configuration
    // -------------------------------------------------------------------------
    /// Target false-positive rate for per-table bloom filters
    pub bloom_fp_rate: f64,
}

const MB: u64 = 1024 * 1024;

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./stratakv_data"),
            threshold: 2000,
            max_levels: 7,
            part_size: 15,
            level_sizes: vec![
                4 * MB,
                8 * MB,
                16 * MB,
                32 * MB,
                64 * MB,
                128 * MB,
                256 * MB,
            ],
            check_interval: Duration::from_millis(200),
            bloom_fp_rate: 0.01,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validate internal consistency
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_levels == 0 {
            return Err(crate::StrataError::Config(
                "max_levels must be at least 1".to_string(),
            ));
        }
        if self.level_sizes.len() < self.max_levels {
            return Err(crate::StrataError::Config(format!(
                "level_sizes has {} entries, need {}",
                self.level_sizes.len(),
                self.max_levels
            )));
        }
        if self.threshold == 0 {
            return Err(crate::StrataError::Config(
                "threshold must be at least 1".to_string(),
            ));
        }
        if !(self.bloom_fp_rate > 0.0 && self.bloom_fp_rate < 1.0) {
            return Err(crate::StrataError::Config(format!(
                "bloom_fp_rate {} outside (0, 1)",
                self.bloom_fp_rate
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the memtable entry-count threshold
    pub fn threshold(mut self, count: usize) -> Self {
        self.config.threshold = count;
        self
    }

    /// Set the number of levels
    pub fn max_levels(mut self, levels: usize) -> Self {
        self.config.max_levels = levels;
        self
    }

    /// Set the max table count per level
    pub fn part_size(mut self, count: usize) -> Self {
        self.config.part_size = count;
        self
    }

    /// Set the per-level byte bounds
    pub fn level_sizes(mut self, sizes: Vec<u64>) -> Self {
        self.config.level_sizes = sizes;
        self
    }

    /// Set the background check interval
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval = interval;
        self
    }

    /// Set the bloom filter false-positive rate
    pub fn bloom_fp_rate(mut self, rate: f64) -> Self {
        self.config.bloom_fp_rate = rate;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
