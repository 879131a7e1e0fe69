//! Error types for object store access

use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// No object exists under the key
    NotFound { key: String },
    /// Transport, authentication or remote-side failure
    Unavailable { key: String, reason: String },
    /// The key cannot be addressed in this store
    InvalidKey(String),
}

impl StoreError {
    pub fn unavailable(key: &str, reason: impl fmt::Display) -> Self {
        StoreError::Unavailable {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { key } => write!(f, "Object not found: {}", key),
            StoreError::Unavailable { key, reason } => {
                write!(f, "Object store unavailable for {}: {}", key, reason)
            }
            StoreError::InvalidKey(key) => write!(f, "Invalid object key: {:?}", key),
        }
    }
}

impl std::error::Error for StoreError {}

pub type Result<T> = std::result::Result<T, StoreError>;
