//! In-memory collaborators and fixtures for unit tests.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::auth::{PasswordHasher, TokenKeys};
use crate::config::{SecurityConfig, TOKEN_TTL_DAYS};
use crate::database::manager::DatabaseError;
use crate::database::models::{
    Listing, ListingChanges, ListingDetail, ListingFilter, ListingImage, NewListing, NewUser, User,
    UserFlags,
};
use crate::database::repository::{ListingRepository, Store, UserRepository};
use crate::services::{Registration, Services};
use crate::storage::{ObjectStorage, PresignedUpload, StorageError};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    listings: Vec<Listing>,
    images: Vec<ListingImage>,
    next_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn detail(&self, listing: &Listing) -> Result<ListingDetail, DatabaseError> {
        let owner = self
            .users
            .iter()
            .find(|u| u.id == listing.user_id)
            .cloned()
            .ok_or_else(|| DatabaseError::QueryError(format!("missing user {}", listing.user_id)))?;
        let mut images: Vec<ListingImage> = self
            .images
            .iter()
            .filter(|i| i.listing_id == listing.id)
            .cloned()
            .collect();
        images.sort_by_key(|i| i.id);
        Ok(ListingDetail {
            listing: listing.clone(),
            owner,
            images,
        })
    }

    fn detail_by_id(&self, id: i32) -> Result<Option<ListingDetail>, DatabaseError> {
        self.listings
            .iter()
            .find(|l| l.id == id)
            .map(|l| self.detail(l))
            .transpose()
    }
}

/// Store that keeps everything in memory. Multi-row writes are staged on a
/// copy of the state and only swapped in when every step succeeds, so a
/// simulated failure leaves nothing behind.
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_image_after: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fail_image_after: AtomicUsize::new(usize::MAX),
        }
    }

    /// Make image inserts fail once `n` images of a batch were written.
    pub fn fail_image_inserts_after(&self, n: usize) {
        self.fail_image_after.store(n, Ordering::SeqCst);
    }

    /// Insert a fixture user under a fresh id.
    pub async fn seed_user(&self, mut user: User) -> User {
        let mut state = self.state.lock().await;
        user.id = state.next_id();
        state.users.push(user.clone());
        user
    }

    pub async fn listing_count(&self) -> usize {
        self.state.lock().await.listings.len()
    }

    pub async fn image_count(&self) -> usize {
        self.state.lock().await.images.len()
    }

    fn insert_images(
        &self,
        state: &mut MemoryState,
        listing_id: i32,
        urls: &[String],
    ) -> Result<(), DatabaseError> {
        let fail_after = self.fail_image_after.load(Ordering::SeqCst);
        for (n, url) in urls.iter().enumerate() {
            if n >= fail_after {
                return Err(DatabaseError::QueryError(
                    "simulated image insert failure".to_string(),
                ));
            }
            let id = state.next_id();
            state.images.push(ListingImage {
                id,
                listing_id,
                image_url: url.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let mut users = self.state.lock().await.users.clone();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().any(|u| u.username == username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, DatabaseError> {
        Ok(self.find_user_by_email(email).await?.is_some())
    }

    async fn insert_user(&self, new: NewUser) -> Result<User, DatabaseError> {
        let mut state = self.state.lock().await;
        let user = User {
            id: state.next_id(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            is_active: true,
            is_staff: new.is_staff,
            date_joined: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user_flags(
        &self,
        username: &str,
        flags: UserFlags,
    ) -> Result<Option<User>, DatabaseError> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.iter_mut().find(|u| u.username == username) else {
            return Ok(None);
        };
        if let Some(active) = flags.is_active {
            user.is_active = active;
        }
        if let Some(staff) = flags.is_staff {
            user.is_staff = staff;
        }
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl ListingRepository for MemoryStore {
    async fn search_listings(
        &self,
        filter: &ListingFilter,
    ) -> Result<Vec<ListingDetail>, DatabaseError> {
        let state = self.state.lock().await;
        let term = filter.search_term().map(str::to_lowercase);
        let sold = filter.sold_constraint();

        let mut listings: Vec<&Listing> = state
            .listings
            .iter()
            .filter(|l| filter.owner_id.map_or(true, |owner| l.user_id == owner))
            .filter(|l| sold.map_or(true, |sold| l.sold == sold))
            .filter(|l| {
                term.as_deref().map_or(true, |t| {
                    l.title.to_lowercase().contains(t) || l.description.to_lowercase().contains(t)
                })
            })
            .collect();
        // None sorts below Some, so descending order puts undated rows last
        listings.sort_by(|a, b| b.date_listed.cmp(&a.date_listed).then(b.id.cmp(&a.id)));

        listings.into_iter().map(|l| state.detail(l)).collect()
    }

    async fn find_listing(&self, id: i32) -> Result<Option<ListingDetail>, DatabaseError> {
        self.state.lock().await.detail_by_id(id)
    }

    async fn create_listing(&self, new: NewListing) -> Result<ListingDetail, DatabaseError> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();

        let listing = Listing {
            id: staged.next_id(),
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            price: new.price,
            date_listed: Some(new.date_listed),
            sold: false,
        };
        staged.listings.push(listing.clone());
        self.insert_images(&mut staged, listing.id, &new.image_urls)?;

        let detail = staged.detail(&listing)?;
        *state = staged;
        Ok(detail)
    }

    async fn apply_listing_changes(
        &self,
        id: i32,
        changes: &ListingChanges,
    ) -> Result<Option<ListingDetail>, DatabaseError> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();

        let Some(listing) = staged.listings.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            listing.title = title.clone();
        }
        if let Some(description) = &changes.description {
            listing.description = description.clone();
        }
        if let Some(price) = changes.price {
            listing.price = price;
        }
        if let Some(sold) = changes.sold {
            listing.sold = sold;
        }

        self.insert_images(&mut staged, id, &changes.add_image_urls)?;
        staged
            .images
            .retain(|i| !(i.listing_id == id && changes.remove_image_ids.contains(&i.id)));

        let detail = staged.detail_by_id(id)?;
        *state = staged;
        Ok(detail)
    }

    async fn set_listing_sold(
        &self,
        id: i32,
        sold: bool,
    ) -> Result<Option<ListingDetail>, DatabaseError> {
        let mut state = self.state.lock().await;
        let Some(listing) = state.listings.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        listing.sold = sold;
        state.detail_by_id(id)
    }

    async fn find_image(&self, image_id: i32) -> Result<Option<ListingImage>, DatabaseError> {
        let state = self.state.lock().await;
        Ok(state.images.iter().find(|i| i.id == image_id).cloned())
    }

    async fn delete_image(&self, image_id: i32) -> Result<bool, DatabaseError> {
        let mut state = self.state.lock().await;
        let before = state.images.len();
        state.images.retain(|i| i.id != image_id);
        Ok(state.images.len() < before)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// One call to [`ObjectStorage::presign_put`].
#[derive(Debug, Clone)]
pub struct PresignRequest {
    pub object_name: String,
    pub content_type: String,
    pub expires_in: Duration,
}

/// Object storage fake that records what it was asked to sign.
#[derive(Default)]
pub struct RecordingStorage {
    requests: std::sync::Mutex<Vec<PresignRequest>>,
}

impl RecordingStorage {
    pub fn requests(&self) -> Vec<PresignRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn presign_put(
        &self,
        object_name: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUpload, StorageError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(PresignRequest {
                object_name: object_name.to_string(),
                content_type: content_type.to_string(),
                expires_in,
            });
        }
        Ok(PresignedUpload {
            url: format!("https://storage.test/bucket/{object_name}?X-Goog-Signature=fake"),
            expires_at: Utc::now() + expires_in,
        })
    }

    fn public_url(&self, object_name: &str) -> String {
        format!("https://storage.test/bucket/{object_name}")
    }
}

pub fn user_fixture(id: i32, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        is_active: true,
        is_staff: false,
        date_joined: Utc::now(),
    }
}

pub fn listing_fixture(id: i32, user_id: i32) -> Listing {
    Listing {
        id,
        user_id,
        title: "Lamp".to_string(),
        description: "Brass lamp".to_string(),
        price: price("15.00"),
        date_listed: Some(Utc::now()),
        sold: false,
    }
}

pub fn registration(username: &str) -> Registration {
    Registration {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: format!("{username}-password"),
        first_name: None,
        last_name: None,
    }
}

pub fn price(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal literal")
}

/// Argon2 parameters cheap enough for tests.
pub fn security_config() -> SecurityConfig {
    SecurityConfig {
        secret_key: "test-secret".to_string(),
        token_ttl_days: TOKEN_TTL_DAYS,
        cors_origins: Vec::new(),
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
    }
}

/// Services wired to a [`MemoryStore`] and a [`RecordingStorage`].
pub struct TestServices {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<RecordingStorage>,
    pub keys: Arc<TokenKeys>,
    pub services: Services,
}

impl TestServices {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(RecordingStorage::default());
        let config = security_config();
        let keys = Arc::new(
            TokenKeys::new(&config.secret_key, Duration::days(config.token_ttl_days))
                .expect("test secret"),
        );
        let hasher = PasswordHasher::new(&config).expect("test argon2 params");
        let services = Services::assemble(
            store.clone(),
            keys.clone(),
            hasher,
            Some(storage.clone() as Arc<dyn ObjectStorage>),
            "listings",
        );
        Self {
            store,
            storage,
            keys,
            services,
        }
    }

    /// Bearer header value for `user`.
    pub fn bearer(&self, user: &User) -> String {
        format!("Bearer {}", self.keys.issue(user).expect("token"))
    }
}

impl std::ops::Deref for TestServices {
    type Target = Services;

    fn deref(&self) -> &Services {
        &self.services
    }
}
