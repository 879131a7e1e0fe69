//! Provider configuration
//!
//! Built from the string properties a host passes at registration time,
//! or from `S3_BLOB_*` environment variables.

use crate::direct::validate_expiry;
use crate::error::{BlobProviderError, Result};
use etag_file_cache::CachePolicy;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const BUCKET_NAME_PROPERTY: &str = "bucket";
pub const BUCKET_REGION_PROPERTY: &str = "region";
pub const AWS_ID_PROPERTY: &str = "awsid";
pub const AWS_SECRET_PROPERTY: &str = "awssecret";
pub const DIRECT_DOWNLOAD_PROPERTY: &str = "directdownload";
pub const DIRECT_DOWNLOAD_EXPIRE_PROPERTY: &str = "directdownload.expire";
pub const CACHE_SIZE_PROPERTY: &str = "cachesize";
pub const CACHE_COUNT_PROPERTY: &str = "cachecount";
pub const CACHE_MIN_AGE_PROPERTY: &str = "cacheminage";
pub const CACHE_DIR_PROPERTY: &str = "cachedir";

const DEFAULT_CACHE_SIZE: &str = "100 mb";
const DEFAULT_DIRECT_DOWNLOAD_EXPIRY: Duration = Duration::from_secs(1);

/// Environment variable for each property
const ENV_PROPERTIES: &[(&str, &str)] = &[
    ("S3_BLOB_BUCKET", BUCKET_NAME_PROPERTY),
    ("S3_BLOB_REGION", BUCKET_REGION_PROPERTY),
    ("S3_BLOB_ACCESS_KEY_ID", AWS_ID_PROPERTY),
    ("S3_BLOB_SECRET_ACCESS_KEY", AWS_SECRET_PROPERTY),
    ("S3_BLOB_DIRECT_DOWNLOAD", DIRECT_DOWNLOAD_PROPERTY),
    ("S3_BLOB_DIRECT_DOWNLOAD_EXPIRE", DIRECT_DOWNLOAD_EXPIRE_PROPERTY),
    ("S3_BLOB_CACHE_SIZE", CACHE_SIZE_PROPERTY),
    ("S3_BLOB_CACHE_COUNT", CACHE_COUNT_PROPERTY),
    ("S3_BLOB_CACHE_MIN_AGE", CACHE_MIN_AGE_PROPERTY),
    ("S3_BLOB_CACHE_DIR", CACHE_DIR_PROPERTY),
];

/// Connection settings handed through to the object store client
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoreSettings {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Configuration for a blob provider instance
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub store: StoreSettings,
    /// Parent of the provider's private cache directory
    pub cache_root: PathBuf,
    pub cache_policy: CachePolicy,
    /// Serve downloads through presigned URLs instead of the cache
    pub direct_download: bool,
    pub direct_download_expiry: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            cache_root: std::env::temp_dir(),
            cache_policy: CachePolicy::default(),
            direct_download: false,
            direct_download_expiry: DEFAULT_DIRECT_DOWNLOAD_EXPIRY,
        }
    }
}

impl ProviderConfig {
    /// Parse configuration from provider properties, defaulting absent keys
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| properties.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let store = StoreSettings {
            bucket: get(BUCKET_NAME_PROPERTY).map(str::to_string),
            region: get(BUCKET_REGION_PROPERTY).map(str::to_string),
            access_key_id: get(AWS_ID_PROPERTY).map(str::to_string),
            secret_access_key: get(AWS_SECRET_PROPERTY).map(str::to_string),
        };

        let max_size_bytes = parse_size(get(CACHE_SIZE_PROPERTY).unwrap_or(DEFAULT_CACHE_SIZE))?;
        let max_entry_count = match get(CACHE_COUNT_PROPERTY) {
            Some(v) => parse_number(CACHE_COUNT_PROPERTY, v)?,
            None => CachePolicy::DEFAULT_MAX_ENTRY_COUNT,
        };
        let min_age = match get(CACHE_MIN_AGE_PROPERTY) {
            Some(v) => Duration::from_secs(parse_number(CACHE_MIN_AGE_PROPERTY, v)?),
            None => CachePolicy::DEFAULT_MIN_AGE,
        };

        let direct_download = match get(DIRECT_DOWNLOAD_PROPERTY) {
            Some(v) => parse_bool(DIRECT_DOWNLOAD_PROPERTY, v)?,
            None => false,
        };
        let direct_download_expiry = match get(DIRECT_DOWNLOAD_EXPIRE_PROPERTY) {
            Some(v) => Duration::from_secs(parse_number(DIRECT_DOWNLOAD_EXPIRE_PROPERTY, v)?),
            None => DEFAULT_DIRECT_DOWNLOAD_EXPIRY,
        };

        let cache_root = get(CACHE_DIR_PROPERTY)
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let config = Self {
            store,
            cache_root,
            cache_policy: CachePolicy::new(max_size_bytes, max_entry_count, min_age),
            direct_download,
            direct_download_expiry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from `S3_BLOB_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse configuration through an environment-style lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let properties: HashMap<String, String> = ENV_PROPERTIES
            .iter()
            .filter_map(|(var, property)| lookup(var).map(|value| (property.to_string(), value)))
            .collect();
        Self::from_properties(&properties)
    }

    pub fn validate(&self) -> Result<()> {
        validate_expiry(self.direct_download_expiry)
    }
}

/// Parse a human readable size such as `100 mb`, `512k` or `1048576`
pub fn parse_size(value: &str) -> Result<u64> {
    let value = value.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        other => {
            return Err(BlobProviderError::Config(format!(
                "invalid size unit {:?} in {:?}",
                other, value
            )))
        }
    };

    let number: u64 = number
        .parse()
        .map_err(|_| BlobProviderError::Config(format!("invalid size {:?}", value)))?;

    number
        .checked_mul(multiplier)
        .ok_or_else(|| BlobProviderError::Config(format!("size {:?} is too large", value)))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| BlobProviderError::Config(format!("invalid {}: {:?}", name, value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(BlobProviderError::Config(format!(
            "invalid {}: {:?}",
            name, value
        ))),
    }
}
