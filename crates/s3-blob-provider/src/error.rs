//! Error types for the blob provider

use etag_file_cache::CacheError;
use remote_object_store::StoreError;
use std::fmt;

#[derive(Debug)]
pub enum BlobProviderError {
    /// The blob reference is absent or has no usable remote key
    InvalidReference(String),
    /// The remote store has no object under the key
    ObjectNotFound { key: String },
    /// Transport, auth or remote-side failure while fetching or signing
    RemoteUnavailable {
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Staging or committing the object to the local cache failed
    CacheWriteFailed { key: String, source: CacheError },
    /// A cached file could not be opened for reading
    CacheReadFailed { key: String, source: std::io::Error },
    /// Writes are never supported by this provider
    UnsupportedOperation(&'static str),
    /// The cache directory could not be removed at shutdown
    TeardownFailed(CacheError),
    Config(String),
}

impl BlobProviderError {
    pub(crate) fn from_store(key: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => BlobProviderError::ObjectNotFound {
                key: key.to_string(),
            },
            StoreError::InvalidKey(_) => {
                BlobProviderError::InvalidReference(format!("{} ({})", key, err))
            }
            StoreError::Unavailable { .. } => BlobProviderError::RemoteUnavailable {
                key: key.to_string(),
                source: Box::new(err),
            },
        }
    }

    pub(crate) fn cache_write(key: &str, source: CacheError) -> Self {
        BlobProviderError::CacheWriteFailed {
            key: key.to_string(),
            source,
        }
    }

    /// The remote key the failure concerns, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            BlobProviderError::ObjectNotFound { key }
            | BlobProviderError::RemoteUnavailable { key, .. }
            | BlobProviderError::CacheWriteFailed { key, .. }
            | BlobProviderError::CacheReadFailed { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for BlobProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobProviderError::InvalidReference(msg) => write!(f, "Invalid blob reference: {}", msg),
            BlobProviderError::ObjectNotFound { key } => write!(f, "Object not found: {}", key),
            BlobProviderError::RemoteUnavailable { key, source } => {
                write!(f, "Remote store unavailable for {}: {}", key, source)
            }
            BlobProviderError::CacheWriteFailed { key, source } => {
                write!(f, "Failed to cache {}: {}", key, source)
            }
            BlobProviderError::CacheReadFailed { key, source } => {
                write!(f, "Failed to read cached copy of {}: {}", key, source)
            }
            BlobProviderError::UnsupportedOperation(op) => {
                write!(f, "Unsupported operation: {} (read-only provider)", op)
            }
            BlobProviderError::TeardownFailed(err) => write!(f, "Teardown failed: {}", err),
            BlobProviderError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for BlobProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobProviderError::RemoteUnavailable { source, .. } => Some(source.as_ref()),
            BlobProviderError::CacheWriteFailed { source, .. } => Some(source),
            BlobProviderError::CacheReadFailed { source, .. } => Some(source),
            BlobProviderError::TeardownFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<tracing_subscriber::filter::ParseError> for BlobProviderError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        BlobProviderError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BlobProviderError>;
