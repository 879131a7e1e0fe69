//! Read-only blob provider over a remote object store
//!
//! Blobs are served in one of two ways:
//!
//! - **Cached**: the object is streamed into a private disk cache keyed by
//!   its remote ETag, and the caller reads the local copy. The remote store
//!   is asked for the current ETag on every resolve, so a changed object is
//!   never served stale.
//! - **Direct**: for downloads, when enabled, the caller receives a
//!   presigned URL that carries `Content-Type` and `Content-Disposition`
//!   overrides, and fetches the object from the store itself.
//!
//! # Example
//!
//! ```no_run
//! use remote_object_store::MemoryObjectStore;
//! use s3_blob_provider::{
//!     BlobAccess, BlobAccessProvider, BlobReference, ProviderConfig, SimpleBlobProvider,
//!     UsageHint,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), s3_blob_provider::BlobProviderError> {
//! let store = Arc::new(MemoryObjectStore::new());
//! let config = ProviderConfig::from_env()?;
//! let provider = SimpleBlobProvider::initialize("s3simple", config, store)?;
//!
//! let blob = BlobReference::parse("s3simple:videos/clip.mov")?
//!     .with_filename("clip.mov")
//!     .with_mime_type("video/quicktime");
//!
//! match provider.access(&blob, UsageHint::Download).await? {
//!     BlobAccess::Direct(direct) => println!("redirect to {}", direct.url),
//!     BlobAccess::Cached(cached) => println!("serve {}", cached.path().display()),
//!     BlobAccess::Unsupported => println!("not available"),
//! }
//!
//! provider.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod direct;
mod error;
pub mod fetch;
pub mod headers;
pub mod logging;
mod provider;
mod reference;
mod stream;

pub use config::{ProviderConfig, StoreSettings};
pub use direct::{DirectAccessIssuer, DirectUrl, MAX_DIRECT_URL_EXPIRY};
pub use error::{BlobProviderError, Result};
pub use fetch::FetchCoordinator;
pub use provider::{BlobAccess, BlobAccessProvider, SimpleBlobProvider};
pub use reference::{BlobInfo, BlobReference, UsageHint};
pub use stream::BlobStream;

pub use etag_file_cache::{CachePolicy, CacheStats, CachedBlob};
