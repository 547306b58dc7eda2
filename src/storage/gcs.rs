use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use super::{encode_object_path, ObjectStorage, PresignedUpload, StorageError};
use crate::config::StorageConfig;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "GOOG4-HMAC-SHA256";
const REGION: &str = "auto";
const SERVICE: &str = "storage";
const REQUEST_TYPE: &str = "goog4_request";
const SIGNED_HEADERS: &str = "content-type;host";
const MAX_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Google Cloud Storage V4 URL signer using an HMAC key pair.
pub struct GcsSigner {
    bucket: String,
    scheme: String,
    host: String,
    access_id: String,
    secret: String,
}

impl std::fmt::Debug for GcsSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsSigner")
            .field("bucket", &self.bucket)
            .field("host", &self.host)
            .field("access_id", &self.access_id)
            .finish_non_exhaustive()
    }
}

impl GcsSigner {
    /// `Ok(None)` when no bucket is configured. A bucket without HMAC
    /// credentials is an error.
    pub fn from_config(config: &StorageConfig) -> Result<Option<Self>, StorageError> {
        let Some(bucket) = config.bucket.clone() else {
            return Ok(None);
        };
        let access_id = config
            .hmac_access_id
            .clone()
            .ok_or(StorageError::MissingCredential("GCS_HMAC_ACCESS_ID"))?;
        let secret = config
            .hmac_secret
            .clone()
            .ok_or(StorageError::MissingCredential("GCS_HMAC_SECRET"))?;

        Self::new(bucket, &config.endpoint, access_id, secret).map(Some)
    }

    pub fn new(
        bucket: String,
        endpoint: &str,
        access_id: String,
        secret: String,
    ) -> Result<Self, StorageError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| StorageError::InvalidEndpoint(e.to_string()))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(StorageError::InvalidEndpoint(endpoint.to_string())),
        };

        Ok(Self {
            bucket,
            scheme: endpoint.scheme().to_string(),
            host,
            access_id,
            secret,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn resource_path(&self, object_name: &str) -> String {
        format!("/{}/{}", self.bucket, encode_object_path(object_name))
    }

    /// Sign a PUT as of `now`.
    pub fn sign_put_at(
        &self,
        object_name: &str,
        content_type: &str,
        expires_in: Duration,
        now: DateTime<Utc>,
    ) -> Result<PresignedUpload, StorageError> {
        let expires_seconds = expires_in.num_seconds();
        if expires_seconds <= 0 || expires_seconds > MAX_EXPIRY_SECONDS {
            return Err(StorageError::Signing(format!(
                "expiry of {expires_seconds}s is outside 1..={MAX_EXPIRY_SECONDS}"
            )));
        }

        let datestamp = now.format("%Y%m%d").to_string();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!("{datestamp}/{REGION}/{SERVICE}/{REQUEST_TYPE}");
        let resource = self.resource_path(object_name);

        // Already in canonical (sorted) order
        let params = [
            ("X-Goog-Algorithm", ALGORITHM.to_string()),
            ("X-Goog-Credential", format!("{}/{}", self.access_id, scope)),
            ("X-Goog-Date", timestamp.clone()),
            ("X-Goog-Expires", expires_seconds.to_string()),
            ("X-Goog-SignedHeaders", SIGNED_HEADERS.to_string()),
        ];
        let canonical_query = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_headers = format!(
            "content-type:{}\nhost:{}\n",
            content_type.trim(),
            self.host
        );
        let canonical_request = format!(
            "PUT\n{resource}\n{canonical_query}\n{canonical_headers}\n{SIGNED_HEADERS}\nUNSIGNED-PAYLOAD"
        );

        let string_to_sign = format!(
            "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&datestamp)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(PresignedUpload {
            url: format!(
                "{}://{}{}?{}&X-Goog-Signature={}",
                self.scheme, self.host, resource, canonical_query, signature
            ),
            expires_at: now + expires_in,
        })
    }

    fn signing_key(&self, datestamp: &str) -> Result<Vec<u8>, StorageError> {
        let k_date = hmac_sha256(format!("GOOG4{}", self.secret).as_bytes(), datestamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, REGION.as_bytes())?;
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes())?;
        hmac_sha256(&k_service, REQUEST_TYPE.as_bytes())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| StorageError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[async_trait]
impl ObjectStorage for GcsSigner {
    async fn presign_put(
        &self,
        object_name: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUpload, StorageError> {
        self.sign_put_at(object_name, content_type, expires_in, Utc::now())
    }

    fn public_url(&self, object_name: &str) -> String {
        format!(
            "{}://{}{}",
            self.scheme,
            self.host,
            self.resource_path(object_name)
        )
    }
}
