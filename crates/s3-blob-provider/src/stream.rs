//! Readable stream over a cached blob

use etag_file_cache::CachedBlob;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

/// Reads a cached file while keeping its cache entry alive.
///
/// Eviction may retire the entry mid-read; the file stays on disk until
/// this stream is dropped.
pub struct BlobStream {
    file: File,
    blob: CachedBlob,
}

impl BlobStream {
    pub(crate) fn new(file: File, blob: CachedBlob) -> Self {
        Self { file, blob }
    }

    pub fn blob(&self) -> &CachedBlob {
        &self.blob
    }

    pub fn len(&self) -> u64 {
        self.blob.size()
    }

    pub fn is_empty(&self) -> bool {
        self.blob.size() == 0
    }
}

impl AsyncRead for BlobStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_read(cx, buf)
    }
}
