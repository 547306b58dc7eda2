//! Object storage collaborator: mints pre-signed upload URLs.

pub mod gcs;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub use gcs::GcsSigner;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("GCS_BUCKET_NAME is not configured.")]
    NotConfigured,

    #[error("Missing storage configuration: {0}")]
    MissingCredential(&'static str),

    #[error("Invalid storage endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// A write permission for one object, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUpload {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Sign a PUT of `object_name` with exactly `content_type`.
    async fn presign_put(
        &self,
        object_name: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUpload, StorageError>;

    /// Where the object can be read once uploaded.
    fn public_url(&self, object_name: &str) -> String;
}

/// Percent-encode an object name for use as a URL path, keeping `/`.
pub(crate) fn encode_object_path(object_name: &str) -> String {
    object_name
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_segments_but_keeps_slashes() {
        assert_eq!(
            encode_object_path("listings/user_1/ab_my photo.png"),
            "listings/user_1/ab_my%20photo.png"
        );
    }
}
