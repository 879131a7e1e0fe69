//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Snapshot of one resident cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounds enforced by the eviction pass, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Total bytes the cache may hold before eviction kicks in
    pub max_size_bytes: u64,
    /// Maximum number of distinct fingerprints retained
    pub max_entry_count: usize,
    /// Entries accessed more recently than this are never evicted
    pub min_age: Duration,
}

impl CachePolicy {
    pub const DEFAULT_MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;
    pub const DEFAULT_MAX_ENTRY_COUNT: usize = 10_000;
    pub const DEFAULT_MIN_AGE: Duration = Duration::from_secs(3600);

    pub fn new(max_size_bytes: u64, max_entry_count: usize, min_age: Duration) -> Self {
        Self {
            max_size_bytes,
            max_entry_count,
            min_age,
        }
    }

    /// Whether a cache holding `entries` files totalling `total_size` bytes is within bounds
    pub fn allows(&self, entries: usize, total_size: u64) -> bool {
        entries <= self.max_entry_count && total_size <= self.max_size_bytes
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_SIZE_BYTES,
            Self::DEFAULT_MAX_ENTRY_COUNT,
            Self::DEFAULT_MIN_AGE,
        )
    }
}
