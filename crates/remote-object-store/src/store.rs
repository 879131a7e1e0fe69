//! The object store trait and its wire-neutral types

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Query parameter asking the store to override the response `Content-Type`
pub const RESPONSE_CONTENT_TYPE: &str = "response-content-type";
/// Query parameter asking the store to override the response `Content-Disposition`
pub const RESPONSE_CONTENT_DISPOSITION: &str = "response-content-disposition";

/// Object content as a stream of chunks.
///
/// Dropping the stream closes the underlying connection, whether or not it
/// was read to the end.
pub type ObjectBody = BoxStream<'static, std::io::Result<Bytes>>;

/// An object opened for reading
pub struct RemoteObject {
    /// Content fingerprint (the ETag as returned by the store, quotes included)
    pub fingerprint: String,
    /// Content length in bytes
    pub size: u64,
    pub body: ObjectBody,
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("fingerprint", &self.fingerprint)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Response headers a presigned URL makes the store send back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseOverrides {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

impl ResponseOverrides {
    /// Override parameters as they appear in the URL query
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(content_type) = &self.content_type {
            pairs.push((RESPONSE_CONTENT_TYPE, content_type.as_str()));
        }
        if let Some(disposition) = &self.content_disposition {
            pairs.push((RESPONSE_CONTENT_DISPOSITION, disposition.as_str()));
        }
        pairs
    }
}

/// Read-only access to a remote object store.
///
/// Implementations own authentication, endpoint selection and retries.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open an object, returning its fingerprint, size and content stream.
    ///
    /// Fails with `NotFound` when the key does not exist.
    async fn fetch(&self, key: &str) -> Result<RemoteObject>;

    /// Produce a GET URL for `key` valid for `expires_in`, embedding `overrides`
    /// as response-overriding parameters.
    async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
        overrides: &ResponseOverrides,
    ) -> Result<Url>;
}
