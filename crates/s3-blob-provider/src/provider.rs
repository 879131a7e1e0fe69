//! Access coordinator and the provider capability

use crate::config::ProviderConfig;
use crate::direct::{DirectAccessIssuer, DirectUrl};
use crate::error::{BlobProviderError, Result};
use crate::fetch::FetchCoordinator;
use crate::reference::{BlobInfo, BlobReference, UsageHint};
use crate::stream::BlobStream;
use async_trait::async_trait;
use etag_file_cache::{CachedBlob, FileCache};
use remote_object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Expiries shorter than this are allowed but rarely intended
const SHORT_EXPIRY_WARNING: Duration = Duration::from_secs(10);

/// How a caller should obtain a blob's content
#[derive(Debug, Clone)]
pub enum BlobAccess {
    /// Read the locally cached copy
    Cached(CachedBlob),
    /// Fetch straight from the remote store
    Direct(DirectUrl),
    /// The requested use is not available from a read-only provider
    Unsupported,
}

/// Read access to blobs held in a remote store
#[async_trait]
pub trait BlobAccessProvider: Send + Sync {
    /// Resolve a blob to a local cached copy
    async fn resolve(&self, blob: &BlobReference) -> Result<CachedBlob>;

    /// Issue a direct URL, if the provider supports them
    async fn issue_direct_url(
        &self,
        blob: &BlobReference,
        expires_in: Duration,
    ) -> Result<Option<DirectUrl>>;

    /// Release the provider's local resources
    async fn close(&self) -> Result<()>;
}

/// Read-only provider over a single bucket, with a private disk cache
pub struct SimpleBlobProvider {
    provider_id: String,
    config: ProviderConfig,
    cache: Arc<FileCache>,
    fetcher: FetchCoordinator,
    issuer: DirectAccessIssuer,
}

impl SimpleBlobProvider {
    /// Validate `config` and create the provider's cache directory
    pub fn initialize(
        provider_id: impl Into<String>,
        config: ProviderConfig,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        let provider_id = provider_id.into();
        config.validate()?;

        let cache = FileCache::create_in(&config.cache_root, config.cache_policy.clone())
            .map_err(|e| {
                BlobProviderError::Config(format!(
                    "Failed to create cache under {}: {}",
                    config.cache_root.display(),
                    e
                ))
            })?;
        let cache = Arc::new(cache);

        if config.direct_download && config.direct_download_expiry < SHORT_EXPIRY_WARNING {
            warn!(
                provider_id = %provider_id,
                expiry_secs = config.direct_download_expiry.as_secs(),
                "Direct download URLs expire very quickly"
            );
        }

        info!(
            provider_id = %provider_id,
            bucket = ?config.store.bucket,
            direct_download = config.direct_download,
            cache_dir = ?cache.dir(),
            "Blob provider initialized"
        );

        Ok(Self {
            provider_id,
            fetcher: FetchCoordinator::new(Arc::clone(&store), Arc::clone(&cache)),
            issuer: DirectAccessIssuer::new(store),
            cache,
            config,
        })
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Accept a host blob descriptor that names this provider
    pub fn read_blob(&self, info: Option<&BlobInfo>) -> Result<BlobReference> {
        let blob = BlobReference::from_info(info)?;
        self.check_provider(&blob)?;
        Ok(blob)
    }

    fn check_provider(&self, blob: &BlobReference) -> Result<()> {
        if blob.provider_id() != self.provider_id {
            return Err(BlobProviderError::InvalidReference(format!(
                "{} belongs to provider {:?}, not {:?}",
                blob.key(),
                blob.provider_id(),
                self.provider_id
            )));
        }
        Ok(())
    }

    fn wants_direct(&self, hint: UsageHint) -> bool {
        hint == UsageHint::Download && self.config.direct_download
    }

    /// Decide how `blob` should be served for `hint`
    pub async fn access(&self, blob: &BlobReference, hint: UsageHint) -> Result<BlobAccess> {
        self.check_provider(blob)?;

        if hint == UsageHint::Edit {
            debug!(key = blob.remote_key(), "Edit requested from read-only provider");
            return Ok(BlobAccess::Unsupported);
        }

        if self.wants_direct(hint) {
            let direct = self
                .issuer
                .issue(blob, self.config.direct_download_expiry)
                .await?;
            return Ok(BlobAccess::Direct(direct));
        }

        Ok(BlobAccess::Cached(self.fetcher.resolve(blob).await?))
    }

    /// A direct URL for `blob`, when the hint and configuration call for one
    pub async fn direct_uri(
        &self,
        blob: &BlobReference,
        hint: UsageHint,
    ) -> Result<Option<DirectUrl>> {
        self.check_provider(blob)?;
        if !self.wants_direct(hint) {
            return Ok(None);
        }
        let direct = self
            .issuer
            .issue(blob, self.config.direct_download_expiry)
            .await?;
        Ok(Some(direct))
    }

    /// Open the cached copy of `blob` for reading
    pub async fn open_stream(&self, blob: &BlobReference) -> Result<BlobStream> {
        self.check_provider(blob)?;
        let cached = self.fetcher.resolve(blob).await?;
        let file = cached
            .open()
            .await
            .map_err(|source| BlobProviderError::CacheReadFailed {
                key: blob.remote_key().to_string(),
                source,
            })?;
        Ok(BlobStream::new(file, cached))
    }

    /// Uploads are never possible through this provider
    pub fn write_blob(&self, _content: Option<&[u8]>) -> Result<String> {
        Err(BlobProviderError::UnsupportedOperation("write"))
    }

    pub fn supports_user_update(&self) -> bool {
        false
    }
}

#[async_trait]
impl BlobAccessProvider for SimpleBlobProvider {
    async fn resolve(&self, blob: &BlobReference) -> Result<CachedBlob> {
        self.check_provider(blob)?;
        self.fetcher.resolve(blob).await
    }

    async fn issue_direct_url(
        &self,
        blob: &BlobReference,
        expires_in: Duration,
    ) -> Result<Option<DirectUrl>> {
        self.check_provider(blob)?;
        Ok(Some(self.issuer.issue(blob, expires_in).await?))
    }

    async fn close(&self) -> Result<()> {
        self.cache
            .close()
            .await
            .map_err(BlobProviderError::TeardownFailed)?;
        info!(provider_id = %self.provider_id, "Blob provider closed");
        Ok(())
    }
}
