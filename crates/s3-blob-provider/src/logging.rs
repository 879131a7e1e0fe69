//! Tracing setup for processes hosting the provider

use crate::error::{BlobProviderError, Result};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Build a filter from `RUST_LOG` plus a default directive such as `s3_blob_provider=info`
pub fn env_filter(default_directive: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
}

/// Install the global subscriber.
///
/// Logs are JSON for GCP Cloud Logging when `LOG_FORMAT=json`, human readable otherwise.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let env_filter = env_filter(default_directive)?;

    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .try_init()
            .map_err(|e| BlobProviderError::Config(format!("Failed to install logger: {}", e)))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init()
            .map_err(|e| BlobProviderError::Config(format!("Failed to install logger: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_directive() {
        assert!(env_filter("s3_blob_provider=debug").is_ok());
    }

    #[test]
    fn test_env_filter_rejects_bad_directive() {
        let err = env_filter("s3_blob_provider=loud").unwrap_err();
        assert!(matches!(err, BlobProviderError::Config(_)));
    }
}
