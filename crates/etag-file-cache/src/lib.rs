//! Bounded on-disk blob cache keyed by content fingerprint
//!
//! Files are staged into a [`StagingFile`] that lives inside the cache
//! directory, then committed under a fingerprint (usually a remote ETag)
//! with an atomic rename. The first commit for a fingerprint wins.
//!
//! Entries are evicted in least-recently-used order once the cache holds
//! more bytes or more entries than its [`CachePolicy`] allows. Entries
//! accessed within the policy's minimum age are never evicted, so the
//! cache may stay over its bounds for a while.
//!
//! Lookups hand out [`CachedBlob`] handles. An evicted entry's file is
//! only deleted once every handle to it has been dropped, so a reader
//! never sees its file disappear mid-read.

mod cache;
mod error;
mod handle;
mod staging;
mod types;

pub use cache::FileCache;
pub use error::{CacheError, Result};
pub use handle::CachedBlob;
pub use staging::{StagedFile, StagingFile};
pub use types::{CacheEntry, CachePolicy, CacheStats};
