//! Error types for the fingerprint file cache

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum CacheError {
    /// Staging I/O failed (create, write, flush)
    Io(Box<std::io::Error>),
    /// A staged file could not be moved to its final location
    Commit {
        fingerprint: String,
        source: std::io::Error,
    },
    /// The cache directory could not be removed
    Teardown {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The cache has already been torn down
    Closed,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "Cache IO error: {}", err),
            CacheError::Commit {
                fingerprint,
                source,
            } => write!(
                f,
                "Failed to commit cache entry {}: {}",
                fingerprint, source
            ),
            CacheError::Teardown { path, source } => write!(
                f,
                "Failed to remove cache directory {}: {}",
                path.display(),
                source
            ),
            CacheError::Closed => write!(f, "Cache is closed"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Commit { source, .. } => Some(source),
            CacheError::Teardown { source, .. } => Some(source),
            CacheError::Closed => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
