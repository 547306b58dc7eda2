use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::User;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub date_listed: Option<DateTime<Utc>>,
    pub sold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ListingImage {
    pub id: i32,
    pub listing_id: i32,
    pub image_url: String,
}

/// A listing together with its owner and images, as returned by every read.
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    pub listing: Listing,
    pub owner: User,
    pub images: Vec<ListingImage>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub date_listed: DateTime<Utc>,
    pub image_urls: Vec<String>,
}

/// Field changes and image edits applied to one listing in a single transaction.
#[derive(Debug, Clone, Default)]
pub struct ListingChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub sold: Option<bool>,
    pub add_image_urls: Vec<String>,
    pub remove_image_ids: Vec<i32>,
}

/// Filter for listing searches.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub search: Option<String>,
    pub owner_id: Option<i32>,
    pub include_sold: bool,
    pub sold: Option<bool>,
}

impl ListingFilter {
    /// The sold value rows must match, if any. An explicit `sold` wins over
    /// `include_sold`; without either, sold listings are hidden.
    pub fn sold_constraint(&self) -> Option<bool> {
        match self.sold {
            Some(sold) => Some(sold),
            None if self.include_sold => None,
            None => Some(false),
        }
    }

    /// The search term as given. Whitespace-only terms are ignored.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}
