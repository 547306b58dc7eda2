use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::UPLOAD_URL_TTL_MINUTES;
use crate::database::models::User;
use crate::error::MarketError;
use crate::storage::{ObjectStorage, StorageError};

/// Write permission for one listing image, plus where it will be readable.
#[derive(Debug, Clone)]
pub struct UploadGrant {
    pub signed_url: String,
    pub public_url: String,
    pub object_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues short-lived, per-user upload URLs for listing images.
#[derive(Clone)]
pub struct UploadService {
    storage: Option<Arc<dyn ObjectStorage>>,
    prefix: String,
}

impl UploadService {
    /// `storage` is `None` when no bucket is configured; every request then
    /// fails with a configuration error.
    pub fn new(storage: Option<Arc<dyn ObjectStorage>>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub async fn authorize_upload(
        &self,
        actor: Option<&User>,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadGrant, MarketError> {
        let actor = actor.ok_or(MarketError::AuthenticationRequired)?;
        if !content_type.starts_with("image/") {
            return Err(MarketError::validation("Only image uploads are allowed."));
        }
        let storage = self
            .storage
            .as_ref()
            .ok_or(MarketError::Storage(StorageError::NotConfigured))?;

        let object_name = self.object_name(actor.id, filename);
        let presigned = storage
            .presign_put(
                &object_name,
                content_type,
                Duration::minutes(UPLOAD_URL_TTL_MINUTES),
            )
            .await?;

        info!("Issued upload URL for user {}: {}", actor.id, object_name);
        Ok(UploadGrant {
            signed_url: presigned.url,
            public_url: storage.public_url(&object_name),
            object_name,
            expires_at: presigned.expires_at,
        })
    }

    /// `{prefix}/user_{id}/{random}_{filename}`
    fn object_name(&self, user_id: i32, filename: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        let unique = Uuid::new_v4().simple();
        let safe = secure_filename(filename);
        if prefix.is_empty() {
            format!("user_{user_id}/{unique}_{safe}")
        } else {
            format!("{prefix}/user_{user_id}/{unique}_{safe}")
        }
    }
}

/// Reduce a client filename to `[A-Za-z0-9._-]`.
///
/// Each run of other characters becomes one `_`, leading and trailing `.`/`_`
/// are stripped, and an empty result is replaced by a random name.
pub fn secure_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut replacing = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            replacing = false;
        } else if !replacing {
            out.push('_');
            replacing = true;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        format!("file_{}", Uuid::new_v4().simple())
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{user_fixture, RecordingStorage};

    fn service(storage: &Arc<RecordingStorage>) -> UploadService {
        UploadService::new(Some(storage.clone() as Arc<dyn ObjectStorage>), "listings")
    }

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(secure_filename("desk.png"), "desk.png");
        assert_eq!(secure_filename("my photo (1).png"), "my_photo_1_.png");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("__.hidden._"), "hidden");
        assert_eq!(secure_filename("caf\u{e9}.jpg"), "caf_.jpg");
    }

    #[test]
    fn empty_sanitized_name_gets_random_identifier() {
        let name = secure_filename("???");
        assert!(name.starts_with("file_"));
        assert_eq!(name.len(), "file_".len() + 32);
        assert_ne!(secure_filename(""), secure_filename(""));
    }

    #[tokio::test]
    async fn rejects_non_image_content_type() {
        let storage = Arc::new(RecordingStorage::default());
        let user = user_fixture(5, "uploader");
        let err = service(&storage)
            .authorize_upload(Some(&user), "notes.txt", "text/plain")
            .await
            .unwrap_err();

        assert!(matches!(err, MarketError::Validation(ref m) if m == "Only image uploads are allowed."));
        assert!(storage.requests().is_empty());
    }

    #[tokio::test]
    async fn requires_identity() {
        let storage = Arc::new(RecordingStorage::default());
        let err = service(&storage)
            .authorize_upload(None, "desk.png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn grants_ten_minute_url_scoped_to_user() {
        let storage = Arc::new(RecordingStorage::default());
        let user = user_fixture(5, "uploader");
        let grant = service(&storage)
            .authorize_upload(Some(&user), "My Desk.png", "image/png")
            .await
            .unwrap();

        assert!(grant.object_name.starts_with("listings/user_5/"));
        assert!(grant.object_name.ends_with("_My_Desk.png"));
        assert!(grant.public_url.ends_with(&grant.object_name));

        let requests = storage.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].object_name, grant.object_name);
        assert_eq!(requests[0].content_type, "image/png");
        assert_eq!(requests[0].expires_in, Duration::minutes(10));
    }

    #[tokio::test]
    async fn object_names_do_not_collide() {
        let storage = Arc::new(RecordingStorage::default());
        let user = user_fixture(5, "uploader");
        let svc = service(&storage);
        let a = svc
            .authorize_upload(Some(&user), "desk.png", "image/png")
            .await
            .unwrap();
        let b = svc
            .authorize_upload(Some(&user), "desk.png", "image/png")
            .await
            .unwrap();
        assert_ne!(a.object_name, b.object_name);
    }

    #[tokio::test]
    async fn missing_bucket_is_a_configuration_error() {
        let user = user_fixture(5, "uploader");
        let err = UploadService::new(None, "listings")
            .authorize_upload(Some(&user), "desk.png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Storage(StorageError::NotConfigured)));
        assert_eq!(err.failure_code(), None);
    }
}
