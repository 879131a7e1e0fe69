//! Blob references and usage hints

use crate::error::{BlobProviderError, Result};
use serde::{Deserialize, Serialize};

/// Blob descriptor as stored by the host repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    /// Composite key `<providerId>:<remoteKey>`
    pub key: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub encoding: Option<String>,
    pub length: Option<u64>,
}

/// An immutable reference to one object in the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReference {
    provider_id: String,
    remote_key: String,
    filename: Option<String>,
    mime_type: Option<String>,
    encoding: Option<String>,
    length: Option<u64>,
}

impl BlobReference {
    /// Parse a composite key.
    ///
    /// Everything after the first `:` is the remote key, so remote keys may
    /// themselves contain colons.
    pub fn parse(key: &str) -> Result<Self> {
        let (provider_id, remote_key) = key.split_once(':').ok_or_else(|| {
            BlobProviderError::InvalidReference(format!("no provider id in {:?}", key))
        })?;

        if provider_id.is_empty() {
            return Err(BlobProviderError::InvalidReference(format!(
                "empty provider id in {:?}",
                key
            )));
        }
        if remote_key.is_empty() {
            return Err(BlobProviderError::InvalidReference(format!(
                "no remote key in {:?}",
                key
            )));
        }

        Ok(Self {
            provider_id: provider_id.to_string(),
            remote_key: remote_key.to_string(),
            filename: None,
            mime_type: None,
            encoding: None,
            length: None,
        })
    }

    /// Validate a host descriptor into a reference
    pub fn from_info(info: Option<&BlobInfo>) -> Result<Self> {
        let info = info.ok_or_else(|| {
            BlobProviderError::InvalidReference("missing blob descriptor".to_string())
        })?;
        let key = info.key.as_deref().ok_or_else(|| {
            BlobProviderError::InvalidReference("blob descriptor has no key".to_string())
        })?;

        let mut reference = Self::parse(key)?;
        reference.filename = info.filename.clone();
        reference.mime_type = info.mime_type.clone();
        reference.encoding = info.encoding.clone();
        reference.length = info.length;
        Ok(reference)
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Name offered to clients: the filename, or the last segment of the remote key
    pub fn display_name(&self) -> &str {
        match self.filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self
                .remote_key
                .rsplit('/')
                .find(|s| !s.is_empty())
                .unwrap_or(self.remote_key.as_str()),
        }
    }

    /// The composite key this reference was parsed from
    pub fn key(&self) -> String {
        format!("{}:{}", self.provider_id, self.remote_key)
    }
}

/// What the caller intends to do with the blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageHint {
    Download,
    Stream,
    View,
    Embed,
    Edit,
}
