//! Configuration for indexes and the snapshot store.

use std::path::{Path, PathBuf};

use allocative::Allocative;
use serde::{Deserialize, Serialize};

/// Tuning knobs of a [LinearHashMap](crate::lin_hash::LinearHashMap).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Allocative)]
pub struct IndexConfig {
    /// Number of (key, value) slots in every bucket (default: 4)
    pub slot_capacity: usize,

    /// Load factor above which one bucket is split (default: 1.1)
    pub load_threshold: f64,

    /// Bucket count of the first generation, `mod1` (default: 4)
    pub initial_buckets: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            slot_capacity: 4,
            load_threshold: 1.1,
            initial_buckets: 4,
        }
    }
}

impl IndexConfig {
    /// Set the number of slots per bucket
    pub fn with_slot_capacity(mut self, slots: usize) -> Self {
        self.slot_capacity = slots.max(1);
        self
    }

    /// Set the split threshold
    pub fn with_load_threshold(mut self, threshold: f64) -> Self {
        self.load_threshold = threshold;
        self
    }

    /// Set the first generation's bucket count
    pub fn with_initial_buckets(mut self, buckets: usize) -> Self {
        self.initial_buckets = buckets.max(1);
        self
    }
}

/// Location of saved table snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one file per table (default: `./store`)
    pub dir: PathBuf,

    /// File extension of snapshot files (default: `dbf`)
    pub extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("store"),
            extension: "dbf".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create a store config rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the snapshot file extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for table `name`.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{}", self.extension))
    }
}
