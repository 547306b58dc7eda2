pub mod credential_service;
pub mod listing_service;
pub mod upload_service;

use std::sync::Arc;

use chrono::Duration;

pub use credential_service::{AuthGrant, CredentialService, Registration};
pub use listing_service::{CreateListing, ListingService, UpdateListing};
pub use upload_service::{UploadGrant, UploadService};

use crate::auth::{PasswordHasher, TokenKeys};
use crate::config::AppConfig;
use crate::database::repository::Store;
use crate::error::MarketError;
use crate::middleware::IdentityResolver;
use crate::storage::ObjectStorage;

/// Everything a request handler needs, shared across requests.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub identity: IdentityResolver,
    pub credentials: CredentialService,
    pub listings: ListingService,
    pub uploads: UploadService,
}

impl Services {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn Store>,
        storage: Option<Arc<dyn ObjectStorage>>,
    ) -> Result<Self, MarketError> {
        let keys = Arc::new(TokenKeys::new(
            &config.security.secret_key,
            Duration::days(config.security.token_ttl_days),
        )?);
        let hasher = PasswordHasher::new(&config.security)?;
        Ok(Self::assemble(
            store,
            keys,
            hasher,
            storage,
            &config.storage.upload_prefix,
        ))
    }

    pub fn assemble(
        store: Arc<dyn Store>,
        keys: Arc<TokenKeys>,
        hasher: PasswordHasher,
        storage: Option<Arc<dyn ObjectStorage>>,
        upload_prefix: &str,
    ) -> Self {
        Self {
            identity: IdentityResolver::new(keys.clone(), store.clone()),
            credentials: CredentialService::new(store.clone(), keys, hasher),
            listings: ListingService::new(store.clone()),
            uploads: UploadService::new(storage, upload_prefix),
            store,
        }
    }
}
