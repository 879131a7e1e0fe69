//! Remote fetch into the local cache

use crate::error::{BlobProviderError, Result};
use crate::reference::BlobReference;
use etag_file_cache::{CachedBlob, FileCache, StagedFile};
use futures::StreamExt;
use remote_object_store::{ObjectBody, ObjectStore, RemoteObject};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Resolves blob references to cached local files.
///
/// The remote store is always asked first: the object's current ETag is
/// what decides whether a local copy is still valid.
pub struct FetchCoordinator {
    store: Arc<dyn ObjectStore>,
    cache: Arc<FileCache>,
    gates: FetchGates,
}

impl FetchCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, cache: Arc<FileCache>) -> Self {
        Self {
            store,
            cache,
            gates: FetchGates::default(),
        }
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    pub async fn resolve(&self, blob: &BlobReference) -> Result<CachedBlob> {
        let key = blob.remote_key();

        let RemoteObject {
            fingerprint,
            size,
            body,
        } = self
            .store
            .fetch(key)
            .await
            .map_err(|e| BlobProviderError::from_store(key, e))?;

        // One download per fingerprint; later arrivals find it cached
        let _gate = self.gates.acquire(&fingerprint).await;

        if let Some(cached) = self.cache.get(&fingerprint).await {
            debug!(key, fingerprint = %fingerprint, "Serving cached copy");
            return Ok(cached);
        }

        let staged = self.stage(key, size, body).await?;
        let cached = self
            .cache
            .put(&fingerprint, staged)
            .await
            .map_err(|e| BlobProviderError::cache_write(key, e))?;

        debug!(key, fingerprint = %fingerprint, size, "Cached remote object");
        Ok(cached)
    }

    /// Drain `body` into a staging file. The staging file is discarded on any failure.
    async fn stage(&self, key: &str, expected_size: u64, mut body: ObjectBody) -> Result<StagedFile> {
        let mut staging = self
            .cache
            .staging_file()
            .map_err(|e| BlobProviderError::cache_write(key, e))?;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| BlobProviderError::RemoteUnavailable {
                key: key.to_string(),
                source: Box::new(e),
            })?;
            staging
                .write_all(&chunk)
                .await
                .map_err(|e| BlobProviderError::cache_write(key, e))?;
        }
        drop(body);

        if staging.written() != expected_size {
            return Err(BlobProviderError::RemoteUnavailable {
                key: key.to_string(),
                source: format!(
                    "body ended after {} of {} bytes",
                    staging.written(),
                    expected_size
                )
                .into(),
            });
        }

        debug!(key, size = expected_size, path = ?staging.path(), "Staged remote object");
        staging
            .finish()
            .await
            .map_err(|e| BlobProviderError::cache_write(key, e))
    }
}

/// Per-fingerprint locks serializing downloads of the same content
#[derive(Default)]
struct FetchGates {
    gates: Mutex<HashMap<String, Gate>>,
}

struct Gate {
    lock: Arc<AsyncMutex<()>>,
    /// Holders and waiters; the entry goes when this reaches zero
    users: usize,
}

struct GateGuard<'a> {
    gates: &'a FetchGates,
    fingerprint: String,
    permit: Option<OwnedMutexGuard<()>>,
}

impl FetchGates {
    async fn acquire(&self, fingerprint: &str) -> GateGuard<'_> {
        let lock = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            let gate = gates.entry(fingerprint.to_string()).or_insert_with(|| Gate {
                lock: Arc::default(),
                users: 0,
            });
            gate.users += 1;
            Arc::clone(&gate.lock)
        };

        // Built before waiting so a cancelled waiter still gives up its slot
        let mut guard = GateGuard {
            gates: self,
            fingerprint: fingerprint.to_string(),
            permit: None,
        };
        guard.permit = Some(lock.lock_owned().await);
        guard
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.permit.take();

        let mut gates = self.gates.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(gate) = gates.get_mut(&self.fingerprint) {
            gate.users = gate.users.saturating_sub(1);
            if gate.users == 0 {
                gates.remove(&self.fingerprint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etag_file_cache::CachePolicy;
    use remote_object_store::MemoryObjectStore;
    use std::time::Duration;
    use tempfile::tempdir;

    fn coordinator(store: Arc<MemoryObjectStore>, root: &std::path::Path) -> FetchCoordinator {
        let cache = FileCache::create_in(
            root,
            CachePolicy::new(1024 * 1024, 100, Duration::from_secs(3600)),
        )
        .unwrap();
        FetchCoordinator::new(store, Arc::new(cache))
    }

    fn staging_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .count()
    }

    #[tokio::test]
    async fn test_resolve_miss_then_hit() {
        let root = tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert_with_etag("abc123", &b"0123456789"[..], "\"e1\"");
        let fetcher = coordinator(store.clone(), root.path());
        let blob = BlobReference::parse("doc:abc123").unwrap();

        let first = fetcher.resolve(&blob).await.unwrap();
        assert_eq!(std::fs::read(first.path()).unwrap(), b"0123456789");
        assert_eq!(first.fingerprint(), "\"e1\"");

        let second = fetcher.resolve(&blob).await.unwrap();
        assert_eq!(second.path(), first.path());

        // The store is consulted both times but content is read once
        assert_eq!(store.fetch_count(), 2);
        assert_eq!(store.body_reads(), 1);
    }

    #[tokio::test]
    async fn test_changed_etag_refetches() {
        let root = tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert_with_etag("abc123", &b"version 1"[..], "\"e1\"");
        let fetcher = coordinator(store.clone(), root.path());
        let blob = BlobReference::parse("doc:abc123").unwrap();

        let old = fetcher.resolve(&blob).await.unwrap();

        store.insert_with_etag("abc123", &b"version 2"[..], "\"e2\"");
        let new = fetcher.resolve(&blob).await.unwrap();

        assert_ne!(old.path(), new.path());
        assert_eq!(std::fs::read(new.path()).unwrap(), b"version 2");
        assert_eq!(store.body_reads(), 2);
    }

    #[tokio::test]
    async fn test_same_content_under_two_keys_is_stored_once() {
        let root = tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("a/copy-1", &b"shared"[..]);
        store.insert("b/copy-2", &b"shared"[..]);
        let fetcher = coordinator(store.clone(), root.path());

        let a = fetcher
            .resolve(&BlobReference::parse("doc:a/copy-1").unwrap())
            .await
            .unwrap();
        let b = fetcher
            .resolve(&BlobReference::parse("doc:b/copy-2").unwrap())
            .await
            .unwrap();

        assert!(a.same_entry(&b));
        assert_eq!(fetcher.cache().stats().await.entries, 1);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let root = tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let fetcher = coordinator(store, root.path());

        let err = fetcher
            .resolve(&BlobReference::parse("doc:nope").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobProviderError::ObjectNotFound { .. }));
        assert_eq!(err.key(), Some("nope"));
        assert_eq!(fetcher.cache().stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_broken_body_leaves_nothing_behind() {
        let root = tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new().with_chunk_size(4));
        store.insert("abc123", &b"0123456789"[..]);
        store.break_body("abc123", 4);
        let fetcher = coordinator(store, root.path());

        let err = fetcher
            .resolve(&BlobReference::parse("doc:abc123").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, BlobProviderError::RemoteUnavailable { .. }));
        assert_eq!(fetcher.cache().stats().await.entries, 0);
        assert_eq!(staging_files(fetcher.cache().dir()), 0);
        assert_eq!(fetcher.gates.len(), 0);
    }

    #[tokio::test]
    async fn test_cache_write_failure() {
        let root = tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("abc123", &b"0123456789"[..]);
        let fetcher = coordinator(store, root.path());

        std::fs::remove_dir_all(fetcher.cache().dir()).unwrap();

        let err = fetcher
            .resolve(&BlobReference::parse("doc:abc123").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobProviderError::CacheWriteFailed { .. }));
        assert_eq!(fetcher.cache().stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_download_once() {
        let root = tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new().with_chunk_size(1));
        store.insert("abc123", vec![7u8; 4096]);
        let fetcher = Arc::new(coordinator(store.clone(), root.path()));
        let blob = BlobReference::parse("doc:abc123").unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let fetcher = Arc::clone(&fetcher);
                let blob = blob.clone();
                tokio::spawn(async move { fetcher.resolve(&blob).await })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        assert!(results.iter().all(|r| r.same_entry(&results[0])));
        assert_eq!(store.fetch_count(), 8);
        assert_eq!(store.body_reads(), 1);
        assert_eq!(fetcher.gates.len(), 0);
        assert_eq!(staging_files(fetcher.cache().dir()), 0);
    }

    #[tokio::test]
    async fn test_cancelled_gate_waiter_releases_entry() {
        let gates = FetchGates::default();

        let owner = gates.acquire("\"e1\"").await;
        let mut waiter = Box::pin(gates.acquire("\"e1\""));
        assert!(futures::poll!(&mut waiter).is_pending());
        assert_eq!(gates.len(), 1);

        drop(owner);
        assert_eq!(gates.len(), 1);

        // The waiter gives up before it is polled again
        drop(waiter);
        assert_eq!(gates.len(), 0);

        let again = gates.acquire("\"e1\"").await;
        assert_eq!(gates.len(), 1);
        drop(again);
        assert_eq!(gates.len(), 0);
    }

    #[tokio::test]
    async fn test_gate_serializes_same_fingerprint_only() {
        let gates = FetchGates::default();

        let held = gates.acquire("\"e1\"").await;
        let mut same = Box::pin(gates.acquire("\"e1\""));
        assert!(futures::poll!(&mut same).is_pending());

        // Another fingerprint is not held up
        let other = gates.acquire("\"e2\"").await;
        assert_eq!(gates.len(), 2);

        drop(held);
        let second = same.await;
        drop(second);
        drop(other);
        assert_eq!(gates.len(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_resolve_cleans_up_staging() {
        let root = tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new().with_chunk_size(1));
        store.insert("abc123", vec![1u8; 64 * 1024]);
        let fetcher = coordinator(store, root.path());
        let blob = BlobReference::parse("doc:abc123").unwrap();

        // Give up almost immediately; the future is dropped mid-download
        let _ = tokio::time::timeout(Duration::from_micros(1), fetcher.resolve(&blob)).await;

        assert_eq!(staging_files(fetcher.cache().dir()), 0);
        assert_eq!(fetcher.gates.len(), 0);
    }
}
