//! Read handles to committed cache files

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// A handle to a committed cache file.
///
/// The file stays on disk for as long as any clone of the handle is alive,
/// even if the entry is evicted or the cache is cleared in the meantime.
/// Once the entry has been retired, dropping the last handle deletes the file.
#[derive(Debug, Clone)]
pub struct CachedBlob {
    inner: Arc<BlobFile>,
}

#[derive(Debug)]
struct BlobFile {
    fingerprint: String,
    path: PathBuf,
    size: u64,
    retired: AtomicBool,
}

impl CachedBlob {
    pub(crate) fn new(fingerprint: String, path: PathBuf, size: u64) -> Self {
        Self {
            inner: Arc::new(BlobFile {
                fingerprint,
                path,
                size,
                retired: AtomicBool::new(false),
            }),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.inner.fingerprint
    }

    /// Local path of the cached file. Read-only; the cache owns the file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn size(&self) -> u64 {
        self.inner.size
    }

    /// Whether the entry has left the cache index (evicted or cleared)
    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::Acquire)
    }

    /// Whether both handles refer to the same committed entry
    pub fn same_entry(&self, other: &CachedBlob) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Open the cached file for reading
    pub async fn open(&self) -> std::io::Result<File> {
        File::open(&self.inner.path).await
    }

    /// Mark the entry as removed from the index; the file goes with the last handle
    pub(crate) fn retire(&self) {
        self.inner.retired.store(true, Ordering::Release);
    }
}

impl Drop for BlobFile {
    fn drop(&mut self) {
        if !*self.retired.get_mut() {
            return;
        }

        let fingerprint = std::mem::take(&mut self.fingerprint);
        let path = std::mem::take(&mut self.path);

        // Keep the unlink off the async worker threads when there is a runtime
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_retired(&fingerprint, &path));
            }
            Err(_) => remove_retired(&fingerprint, &path),
        }
    }
}

fn remove_retired(fingerprint: &str, path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(fingerprint, path = ?path, "Removed retired cache file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(fingerprint, path = ?path, error = %e, "Failed to remove retired cache file")
        }
    }
}

/// Wait for a deferred unlink to land
#[cfg(test)]
pub(crate) async fn wait_for_removal(path: &Path) -> bool {
    for _ in 0..200 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    !path.exists()
}
