use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::auth::may_modify;
use crate::database::models::{ListingChanges, ListingDetail, ListingFilter, NewListing, User};
use crate::database::repository::Store;
use crate::error::MarketError;

const NEGATIVE_PRICE: &str = "Price must be non-negative.";
const PRICE_DECIMAL_PLACES: &str = "Ensure that there are no more than 2 decimal places.";
const PRICE_WHOLE_DIGITS: &str = "Ensure that there are no more than 8 digits before the decimal point.";

/// Column limits of `listings.title` and `listings.price NUMERIC(10, 2)`.
pub const MAX_TITLE_LENGTH: usize = 255;
const PRICE_SCALE: u32 = 2;
const PRICE_WHOLE_LIMIT: i64 = 100_000_000;
const LISTING_NOT_FOUND: &str = "Listing not found.";
const IMAGE_NOT_FOUND: &str = "Image not found.";

#[derive(Debug, Clone)]
pub struct CreateListing {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateListing {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub sold: Option<bool>,
    pub add_image_urls: Vec<String>,
    pub remove_image_ids: Vec<i32>,
}

/// Reads and ownership-checked writes over listings and their images.
#[derive(Clone)]
pub struct ListingService {
    store: Arc<dyn Store>,
}

impl ListingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, filter: &ListingFilter) -> Result<Vec<ListingDetail>, MarketError> {
        Ok(self.store.search_listings(filter).await?)
    }

    pub async fn get(&self, id: i32) -> Result<Option<ListingDetail>, MarketError> {
        Ok(self.store.find_listing(id).await?)
    }

    /// Listings owned by the caller; anonymous callers own nothing.
    pub async fn mine(
        &self,
        actor: Option<&User>,
        include_sold: bool,
    ) -> Result<Vec<ListingDetail>, MarketError> {
        let Some(actor) = actor else {
            return Ok(Vec::new());
        };
        self.list(&ListingFilter {
            owner_id: Some(actor.id),
            include_sold,
            ..Default::default()
        })
        .await
    }

    pub async fn create(
        &self,
        actor: Option<&User>,
        input: CreateListing,
    ) -> Result<ListingDetail, MarketError> {
        let actor = actor.ok_or(MarketError::AuthenticationRequired)?;
        ensure_title(&input.title)?;
        ensure_price(input.price)?;

        let detail = self
            .store
            .create_listing(NewListing {
                user_id: actor.id,
                title: input.title,
                description: input.description,
                price: input.price,
                date_listed: Utc::now(),
                image_urls: input.image_urls,
            })
            .await?;

        info!(
            "User {} created listing {} with {} images",
            actor.id,
            detail.listing.id,
            detail.images.len()
        );
        Ok(detail)
    }

    pub async fn update(
        &self,
        actor: Option<&User>,
        id: i32,
        input: UpdateListing,
    ) -> Result<ListingDetail, MarketError> {
        let actor = actor.ok_or(MarketError::AuthenticationRequired)?;
        self.load_modifiable(actor, id, "Not allowed to edit this listing.")
            .await?;
        if let Some(title) = input.title.as_deref() {
            ensure_title(title)?;
        }
        if let Some(price) = input.price {
            ensure_price(price)?;
        }

        let changes = ListingChanges {
            title: input.title,
            description: input.description,
            price: input.price,
            sold: input.sold,
            add_image_urls: input.add_image_urls,
            remove_image_ids: input.remove_image_ids,
        };
        let detail = self
            .store
            .apply_listing_changes(id, &changes)
            .await?
            .ok_or_else(|| MarketError::not_found(LISTING_NOT_FOUND))?;

        info!("User {} updated listing {}", actor.id, id);
        Ok(detail)
    }

    pub async fn set_sold(
        &self,
        actor: Option<&User>,
        id: i32,
        sold: bool,
    ) -> Result<ListingDetail, MarketError> {
        let actor = actor.ok_or(MarketError::AuthenticationRequired)?;
        self.load_modifiable(actor, id, "Not allowed to update this listing.")
            .await?;

        let detail = self
            .store
            .set_listing_sold(id, sold)
            .await?
            .ok_or_else(|| MarketError::not_found(LISTING_NOT_FOUND))?;

        info!("User {} set listing {} sold={}", actor.id, id, sold);
        Ok(detail)
    }

    /// Delete one image after checking ownership of its parent listing.
    pub async fn delete_image(&self, actor: Option<&User>, image_id: i32) -> Result<(), MarketError> {
        let actor = actor.ok_or(MarketError::AuthenticationRequired)?;

        let image = self
            .store
            .find_image(image_id)
            .await?
            .ok_or_else(|| MarketError::not_found(IMAGE_NOT_FOUND))?;
        self.load_modifiable(actor, image.listing_id, "Not allowed.")
            .await?;

        if !self.store.delete_image(image_id).await? {
            return Err(MarketError::not_found(IMAGE_NOT_FOUND));
        }

        info!(
            "User {} deleted image {} from listing {}",
            actor.id, image_id, image.listing_id
        );
        Ok(())
    }

    /// Fetch a listing the actor may change, distinguishing missing from forbidden.
    async fn load_modifiable(
        &self,
        actor: &User,
        id: i32,
        denial: &str,
    ) -> Result<ListingDetail, MarketError> {
        let detail = self
            .store
            .find_listing(id)
            .await?
            .ok_or_else(|| MarketError::not_found(LISTING_NOT_FOUND))?;

        if !may_modify(actor, &detail) {
            warn!(
                "User {} denied access to listing {} owned by {}",
                actor.id, id, detail.listing.user_id
            );
            return Err(MarketError::permission_denied(denial));
        }
        Ok(detail)
    }
}

fn ensure_title(title: &str) -> Result<(), MarketError> {
    let length = title.chars().count();
    if length > MAX_TITLE_LENGTH {
        return Err(MarketError::validation(format!(
            "Ensure this value has at most {MAX_TITLE_LENGTH} characters (it has {length})."
        )));
    }
    Ok(())
}

/// Non-negative and representable in the price column. Trailing zeros do
/// not count against the scale, so "5.000" is accepted.
fn ensure_price(price: Decimal) -> Result<(), MarketError> {
    if price < Decimal::ZERO {
        return Err(MarketError::validation(NEGATIVE_PRICE));
    }
    if price.normalize().scale() > PRICE_SCALE {
        return Err(MarketError::validation(PRICE_DECIMAL_PLACES));
    }
    if price.trunc() >= Decimal::from(PRICE_WHOLE_LIMIT) {
        return Err(MarketError::validation(PRICE_WHOLE_DIGITS));
    }
    Ok(())
}
