//! File-based blob cache keyed by content fingerprint, with in-memory metadata

use crate::error::{CacheError, Result};
use crate::handle::CachedBlob;
use crate::staging::{StagedFile, StagingFile};
use crate::types::{CacheEntry, CachePolicy, CacheStats};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::PoisonError;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const CACHE_DIR_PREFIX: &str = "blobcache.";

/// A bounded blob cache with in-memory metadata and file-based storage
pub struct FileCache {
    /// In-memory index of committed entries
    index: Mutex<CacheIndex>,
    /// Directory where cached blobs are stored
    cache_dir: PathBuf,
    /// Owns the cache directory until teardown
    dir_guard: std::sync::Mutex<Option<TempDir>>,
    policy: CachePolicy,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Default)]
struct CacheIndex {
    entries: HashMap<String, IndexEntry>,
    total_size: u64,
    next_seq: u64,
    closed: bool,
}

struct IndexEntry {
    blob: CachedBlob,
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
    /// Insertion order, breaks ties between equal access times
    seq: u64,
}

impl CacheIndex {
    fn insert(&mut self, fingerprint: String, entry: IndexEntry) {
        self.total_size += entry.blob.size();
        self.entries.insert(fingerprint, entry);
    }

    fn remove(&mut self, fingerprint: &str) -> Option<IndexEntry> {
        let entry = self.entries.remove(fingerprint)?;
        self.total_size = self.total_size.saturating_sub(entry.blob.size());
        Some(entry)
    }

    /// Fingerprints ordered least recently used first, oldest insertion first on ties
    fn eviction_order(&self) -> Vec<(DateTime<Utc>, String)> {
        let mut candidates: Vec<(DateTime<Utc>, u64, &String)> = self
            .entries
            .iter()
            .map(|(fingerprint, entry)| (entry.last_access, entry.seq, fingerprint))
            .collect();
        candidates.sort();
        candidates
            .into_iter()
            .map(|(last_access, _, fingerprint)| (last_access, fingerprint.clone()))
            .collect()
    }
}

impl FileCache {
    /// Create a cache in a fresh, exclusively owned directory under `root`
    pub fn create_in(root: &Path, policy: CachePolicy) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(CACHE_DIR_PREFIX)
            .tempdir_in(root)?;
        let cache_dir = dir.path().to_path_buf();

        info!(
            cache_dir = ?cache_dir,
            max_size = policy.max_size_bytes,
            max_entries = policy.max_entry_count,
            min_age_secs = policy.min_age.as_secs(),
            "Cache initialized"
        );

        Ok(Self {
            index: Mutex::new(CacheIndex::default()),
            cache_dir,
            dir_guard: std::sync::Mutex::new(Some(dir)),
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// File name for a committed entry. Fingerprints such as quoted ETags are
    /// not safe file names, so they are hashed; the sequence keeps a retired
    /// file from colliding with a later commit of the same fingerprint.
    pub fn cache_file_name(fingerprint: &str, seq: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_bytes());
        format!("{}-{}", hex::encode(hasher.finalize()), seq)
    }

    /// Look up a fingerprint, refreshing its last access time on a hit
    pub async fn get(&self, fingerprint: &str) -> Option<CachedBlob> {
        let mut index = self.index.lock().await;

        let path = match index.entries.get(fingerprint) {
            Some(entry) => entry.blob.path().to_path_buf(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint, "Cache miss");
                return None;
            }
        };

        if let Err(e) = fs::metadata(&path).await {
            warn!(fingerprint, path = ?path, error = %e, "Cached file unreadable, removing entry");
            if let Some(entry) = index.remove(fingerprint) {
                entry.blob.retire();
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let entry = index.entries.get_mut(fingerprint)?;
        entry.last_access = Utc::now();
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(fingerprint, "Cache hit");
        Some(entry.blob.clone())
    }

    /// Allocate a staging file inside the cache directory
    pub fn staging_file(&self) -> Result<StagingFile> {
        StagingFile::create_in(&self.cache_dir)
    }

    /// Commit staged content under `fingerprint`.
    ///
    /// If the fingerprint is already cached the staged copy is discarded and
    /// the existing entry is returned. Runs an eviction pass after inserting.
    pub async fn put(&self, fingerprint: &str, staged: StagedFile) -> Result<CachedBlob> {
        let mut index = self.index.lock().await;
        if index.closed {
            return Err(CacheError::Closed);
        }

        let now = Utc::now();
        if let Some(entry) = index.entries.get_mut(fingerprint) {
            entry.last_access = now;
            debug!(fingerprint, "Fingerprint already cached, discarding staged copy");
            return Ok(entry.blob.clone());
        }

        let seq = index.next_seq;
        index.next_seq += 1;

        let path = self.cache_dir.join(Self::cache_file_name(fingerprint, seq));
        let size = staged.size;
        fs::rename(&staged.path, &path)
            .await
            .map_err(|source| CacheError::Commit {
                fingerprint: fingerprint.to_string(),
                source,
            })?;
        // The staged name no longer exists; stop it from being cleaned up
        staged
            .path
            .keep()
            .map_err(|e| CacheError::Commit {
                fingerprint: fingerprint.to_string(),
                source: e.error,
            })?;

        let blob = CachedBlob::new(fingerprint.to_string(), path, size);
        index.insert(
            fingerprint.to_string(),
            IndexEntry {
                blob: blob.clone(),
                created_at: now,
                last_access: now,
                seq,
            },
        );
        debug!(fingerprint, size, "Cached blob");

        self.evict_locked(&mut index, now);

        Ok(blob)
    }

    /// Run an eviction pass, returning the number of entries evicted
    pub async fn evict(&self) -> usize {
        let mut index = self.index.lock().await;
        self.evict_locked(&mut index, Utc::now())
    }

    fn evict_locked(&self, index: &mut CacheIndex, now: DateTime<Utc>) -> usize {
        if self.policy.allows(index.entries.len(), index.total_size) {
            return 0;
        }

        let mut evicted = 0;
        for (last_access, fingerprint) in index.eviction_order() {
            if self.policy.allows(index.entries.len(), index.total_size) {
                break;
            }

            let idle = (now - last_access).to_std().unwrap_or(Duration::ZERO);
            if idle < self.policy.min_age {
                continue;
            }

            if let Some(entry) = index.remove(&fingerprint) {
                entry.blob.retire();
                evicted += 1;
                debug!(fingerprint = %fingerprint, idle_secs = idle.as_secs(), "Evicted cache entry");
            }
        }

        if !self.policy.allows(index.entries.len(), index.total_size) {
            debug!(
                entries = index.entries.len(),
                total_size = index.total_size,
                "Cache over bounds, remaining entries are within min age"
            );
        }

        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Remove every entry. Files still held by readers are deleted when released.
    pub async fn clear(&self) -> usize {
        let mut index = self.index.lock().await;
        let count = Self::drain(&mut index);
        info!(count, "Cache cleared");
        count
    }

    fn drain(index: &mut CacheIndex) -> usize {
        let count = index.entries.len();
        for (_, entry) in index.entries.drain() {
            entry.blob.retire();
        }
        index.total_size = 0;
        count
    }

    /// Clear the cache and remove its directory. Later puts fail with `Closed`.
    pub async fn close(&self) -> Result<()> {
        {
            let mut index = self.index.lock().await;
            if index.closed {
                return Ok(());
            }
            index.closed = true;
            let count = Self::drain(&mut index);
            debug!(count, "Cleared cache for teardown");
        }

        let dir = self
            .dir_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(dir) = dir {
            let path = dir.keep();
            fs::remove_dir_all(&path)
                .await
                .map_err(|source| CacheError::Teardown {
                    path: path.clone(),
                    source,
                })?;
            info!(cache_dir = ?path, "Cache directory removed");
        }

        Ok(())
    }

    /// Snapshot of resident entries, least recently used first
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let index = self.index.lock().await;
        index
            .eviction_order()
            .into_iter()
            .filter_map(|(_, fingerprint)| {
                let entry = index.entries.get(&fingerprint)?;
                Some(CacheEntry {
                    path: entry.blob.path().to_path_buf(),
                    size: entry.blob.size(),
                    created_at: entry.created_at,
                    last_access: entry.last_access,
                    fingerprint,
                })
            })
            .collect()
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.lock().await;
        CacheStats {
            entries: index.entries.len(),
            total_size: index.total_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
