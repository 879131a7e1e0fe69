//! Staging files for content that is not yet committed to the cache

use crate::error::Result;
use std::path::Path;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

pub(crate) const STAGING_PREFIX: &str = ".staging-";

/// A temporary file inside the cache directory, open for writing.
///
/// Lives on the same filesystem as the cache so that committing it is a
/// rename. Dropping it at any point, including when the owning future is
/// abandoned, removes the file.
#[derive(Debug)]
pub struct StagingFile {
    file: File,
    path: TempPath,
    written: u64,
}

impl StagingFile {
    pub(crate) fn create_in(dir: &Path) -> Result<Self> {
        let named = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(dir)?;
        let (file, path) = named.into_parts();

        Ok(Self {
            file: File::from_std(file),
            path,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf).await?;
        self.written += buf.len() as u64;
        Ok(())
    }

    /// Flush and sync the content; the result can be committed with `FileCache::put`
    pub async fn finish(self) -> Result<StagedFile> {
        let StagingFile {
            mut file,
            path,
            written,
        } = self;

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        Ok(StagedFile {
            path,
            size: written,
        })
    }
}

/// Fully written staging content, ready to be committed.
///
/// Removed from disk if dropped without being committed.
#[derive(Debug)]
pub struct StagedFile {
    pub(crate) path: TempPath,
    pub(crate) size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
