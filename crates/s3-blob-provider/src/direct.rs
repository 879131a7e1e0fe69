//! Presigned direct-download URLs

use crate::error::{BlobProviderError, Result};
use crate::headers;
use crate::reference::BlobReference;
use chrono::{DateTime, Utc};
use remote_object_store::{ObjectStore, ResponseOverrides};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Longest lifetime a SigV4 presigned URL may have (7 days)
pub const MAX_DIRECT_URL_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A presigned URL and the moment it stops working
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectUrl {
    pub url: Url,
    pub expires_at: DateTime<Utc>,
}

pub fn validate_expiry(expires_in: Duration) -> Result<()> {
    if expires_in.is_zero() {
        return Err(BlobProviderError::Config(
            "direct download expiry must be at least 1 second".to_string(),
        ));
    }
    if expires_in > MAX_DIRECT_URL_EXPIRY {
        return Err(BlobProviderError::Config(format!(
            "direct download expiry of {}s exceeds the maximum of {}s",
            expires_in.as_secs(),
            MAX_DIRECT_URL_EXPIRY.as_secs()
        )));
    }
    Ok(())
}

/// Issues presigned GET URLs that bypass the local cache entirely
pub struct DirectAccessIssuer {
    store: Arc<dyn ObjectStore>,
}

impl DirectAccessIssuer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Headers the store should send to a client following the URL
    pub fn response_overrides(blob: &BlobReference) -> ResponseOverrides {
        ResponseOverrides {
            content_type: headers::content_type(blob.mime_type(), blob.encoding()),
            content_disposition: Some(headers::content_disposition(blob.display_name())),
        }
    }

    /// Presign a GET for `blob` valid for `expires_in` from now
    pub async fn issue(&self, blob: &BlobReference, expires_in: Duration) -> Result<DirectUrl> {
        validate_expiry(expires_in)?;
        let key = blob.remote_key();

        let issued_at = Utc::now();
        let overrides = Self::response_overrides(blob);
        let url = self
            .store
            .presign_get(key, expires_in, &overrides)
            .await
            .map_err(|e| BlobProviderError::from_store(key, e))?;

        let lifetime = chrono::Duration::from_std(expires_in)
            .map_err(|e| BlobProviderError::Config(e.to_string()))?;

        debug!(key, expires_in_secs = expires_in.as_secs(), "Issued direct download URL");

        Ok(DirectUrl {
            url,
            expires_at: issued_at + lifetime,
        })
    }
}
