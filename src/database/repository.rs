use async_trait::async_trait;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    ListingChanges, ListingDetail, ListingFilter, ListingImage, NewListing, NewUser, User, UserFlags,
};

/// Account storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All accounts ordered by id.
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;

    async fn find_user(&self, id: i32) -> Result<Option<User>, DatabaseError>;

    /// Exact, case-sensitive email match.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn username_exists(&self, username: &str) -> Result<bool, DatabaseError>;

    async fn email_exists(&self, email: &str) -> Result<bool, DatabaseError>;

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;

    /// Returns `None` when no account has that username.
    async fn update_user_flags(
        &self,
        username: &str,
        flags: UserFlags,
    ) -> Result<Option<User>, DatabaseError>;
}

/// Listing and listing image storage.
///
/// Multi-row writes (`create_listing`, `apply_listing_changes`) are
/// all-or-nothing: on error no row from the call remains.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Listings matching the filter, newest first then highest id first.
    async fn search_listings(&self, filter: &ListingFilter)
        -> Result<Vec<ListingDetail>, DatabaseError>;

    async fn find_listing(&self, id: i32) -> Result<Option<ListingDetail>, DatabaseError>;

    async fn create_listing(&self, listing: NewListing) -> Result<ListingDetail, DatabaseError>;

    /// Image removals only touch images belonging to `id`.
    /// Returns `None` when the listing no longer exists.
    async fn apply_listing_changes(
        &self,
        id: i32,
        changes: &ListingChanges,
    ) -> Result<Option<ListingDetail>, DatabaseError>;

    async fn set_listing_sold(
        &self,
        id: i32,
        sold: bool,
    ) -> Result<Option<ListingDetail>, DatabaseError>;

    async fn find_image(&self, image_id: i32) -> Result<Option<ListingImage>, DatabaseError>;

    /// Deletes exactly one image row; `false` when it was already gone.
    async fn delete_image(&self, image_id: i32) -> Result<bool, DatabaseError>;
}

/// Everything the services need from the relational store.
#[async_trait]
pub trait Store: UserRepository + ListingRepository {
    async fn ping(&self) -> Result<(), DatabaseError>;
}
