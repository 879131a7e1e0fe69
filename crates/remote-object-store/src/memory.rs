//! In-process object store

use crate::error::{Result, StoreError};
use crate::store::{ObjectBody, ObjectStore, RemoteObject, ResponseOverrides};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://objects.localhost/bucket/";
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

struct StoredObject {
    data: Bytes,
    etag: String,
    /// Fail the body stream once this many bytes have been sent
    fail_after: Option<usize>,
}

/// Object store held in memory.
///
/// Counts fetches and body reads so callers can tell a metadata-only
/// round trip from a full download.
pub struct MemoryObjectStore {
    endpoint: Url,
    objects: RwLock<HashMap<String, StoredObject>>,
    unavailable: AtomicBool,
    chunk_size: usize,
    fetches: AtomicU64,
    body_reads: Arc<AtomicU64>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        let endpoint = Url::parse(DEFAULT_ENDPOINT).expect("Invalid default endpoint");
        Self::with_endpoint(endpoint)
    }

    /// Presigned URLs are built under `endpoint`
    pub fn with_endpoint(endpoint: Url) -> Self {
        Self {
            endpoint,
            objects: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            chunk_size: DEFAULT_CHUNK_SIZE,
            fetches: AtomicU64::new(0),
            body_reads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Split bodies into chunks of at most `chunk_size` bytes
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// ETag in the S3 style: a quoted hex digest of the content
    pub fn etag_for(data: &[u8]) -> String {
        let digest = Sha256::digest(data);
        format!("\"{}\"", hex::encode(&digest[..16]))
    }

    /// Store an object, returning its ETag
    pub fn insert(&self, key: &str, data: impl Into<Bytes>) -> String {
        let data = data.into();
        let etag = Self::etag_for(&data);
        self.insert_with_etag(key, data, &etag);
        etag
    }

    /// Store an object under an explicit ETag
    pub fn insert_with_etag(&self, key: &str, data: impl Into<Bytes>, etag: &str) {
        self.write_objects().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                etag: etag.to_string(),
                fail_after: None,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.write_objects().remove(key).is_some()
    }

    /// Make the body of `key` fail with a connection reset after `after` bytes
    pub fn break_body(&self, key: &str, after: usize) -> bool {
        match self.write_objects().get_mut(key) {
            Some(object) => {
                object.fail_after = Some(after);
                true
            }
            None => false,
        }
    }

    /// Simulate a store outage for every operation
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Number of `fetch` calls that returned an object
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of bodies whose first chunk was actually pulled
    pub fn body_reads(&self) -> u64 {
        self.body_reads.load(Ordering::Relaxed)
    }

    fn write_objects(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, StoredObject>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self, key: &str) -> Result<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::unavailable(key, "service unavailable"));
        }
        Ok(())
    }

    fn body(&self, data: Bytes, fail_after: Option<usize>) -> ObjectBody {
        let limit = fail_after.unwrap_or(data.len()).min(data.len());
        let mut chunks: Vec<std::io::Result<Bytes>> = Vec::new();
        let mut offset = 0;
        while offset < limit {
            let end = (offset + self.chunk_size).min(limit);
            chunks.push(Ok(data.slice(offset..end)));
            offset = end;
        }
        if fail_after.is_some() {
            chunks.push(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }

        let reads = Arc::clone(&self.body_reads);
        stream::iter(chunks)
            .enumerate()
            .map(move |(i, chunk)| {
                if i == 0 {
                    reads.fetch_add(1, Ordering::Relaxed);
                }
                chunk
            })
            .boxed()
    }

    fn signature(&self, key: &str, expires_in: Duration) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.endpoint.as_str().as_bytes());
        hasher.update(key.as_bytes());
        hasher.update(expires_in.as_secs().to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch(&self, key: &str) -> Result<RemoteObject> {
        self.check_available(key)?;

        let (data, etag, fail_after) = {
            let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
            let object = objects.get(key).ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
            (object.data.clone(), object.etag.clone(), object.fail_after)
        };

        self.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(key, etag = %etag, size = data.len(), "Opened in-memory object");

        Ok(RemoteObject {
            fingerprint: etag,
            size: data.len() as u64,
            body: self.body(data, fail_after),
        })
    }

    async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
        overrides: &ResponseOverrides,
    ) -> Result<Url> {
        self.check_available(key)?;
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidKey(key.to_string()))?
            .pop_if_empty()
            .extend(key.split('/'));

        let signature = self.signature(key, expires_in);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("X-Amz-Expires", &expires_in.as_secs().to_string());
            for (name, value) in overrides.query_pairs() {
                query.append_pair(name, value);
            }
            query.append_pair("X-Amz-Signature", &signature);
        }

        Ok(url)
    }
}
