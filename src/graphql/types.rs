use chrono::{DateTime, TimeZone, Utc};
use juniper::{graphql_object, GraphQLObject};
use rust_decimal::Decimal;

use crate::auth::Claims;
use crate::database::models::{ListingDetail, ListingImage, User};
use crate::error::{FailureCode, MarketError};
use crate::services::{AuthGrant, UploadGrant};

pub struct UserType(pub User);

#[graphql_object(name = "User")]
impl UserType {
    fn id(&self) -> i32 {
        self.0.id
    }

    fn username(&self) -> &str {
        &self.0.username
    }

    fn email(&self) -> &str {
        &self.0.email
    }

    fn first_name(&self) -> &str {
        &self.0.first_name
    }

    fn last_name(&self) -> &str {
        &self.0.last_name
    }

    fn is_staff(&self) -> bool {
        self.0.is_staff
    }

    fn date_joined(&self) -> DateTime<Utc> {
        self.0.date_joined
    }
}

pub struct ListingImageType(pub ListingImage);

#[graphql_object(name = "ListingImage")]
impl ListingImageType {
    fn id(&self) -> i32 {
        self.0.id
    }

    fn image_url(&self) -> &str {
        &self.0.image_url
    }
}

/// A listing with its owner and images already loaded.
pub struct ListingType(pub ListingDetail);

#[graphql_object(name = "Listing")]
impl ListingType {
    fn id(&self) -> i32 {
        self.0.listing.id
    }

    fn title(&self) -> &str {
        &self.0.listing.title
    }

    fn description(&self) -> &str {
        &self.0.listing.description
    }

    fn price(&self) -> Decimal {
        self.0.listing.price
    }

    fn date_listed(&self) -> Option<DateTime<Utc>> {
        self.0.listing.date_listed
    }

    fn sold(&self) -> bool {
        self.0.listing.sold
    }

    /// The owning account
    fn user(&self) -> UserType {
        UserType(self.0.owner.clone())
    }

    /// Images in insertion order
    fn images(&self) -> Vec<ListingImageType> {
        self.0.images.iter().cloned().map(ListingImageType).collect()
    }
}

#[derive(GraphQLObject)]
pub struct AuthPayload {
    pub success: bool,
    pub code: Option<FailureCode>,
    pub message: String,
    pub token: Option<String>,
    pub user: Option<UserType>,
}

impl AuthPayload {
    pub fn granted(grant: AuthGrant, message: &str) -> Self {
        Self {
            success: true,
            code: None,
            message: message.to_string(),
            token: Some(grant.token),
            user: Some(UserType(grant.user)),
        }
    }

    pub fn refused(code: FailureCode, err: &MarketError) -> Self {
        Self {
            success: false,
            code: Some(code),
            message: err.to_string(),
            token: None,
            user: None,
        }
    }
}

/// What a valid token asserts.
#[derive(GraphQLObject)]
pub struct TokenClaims {
    pub user_id: i32,
    pub username: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Claims> for TokenClaims {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id().unwrap_or_default(),
            username: claims.username,
            issued_at: Utc.timestamp_opt(claims.iat, 0).single(),
            expires_at: Utc.timestamp_opt(claims.exp, 0).single(),
        }
    }
}

#[derive(GraphQLObject)]
pub struct VerifyTokenPayload {
    pub success: bool,
    pub code: Option<FailureCode>,
    pub message: String,
    pub claims: Option<TokenClaims>,
}

impl VerifyTokenPayload {
    pub fn ok(claims: Claims) -> Self {
        Self {
            success: true,
            code: None,
            message: "Token is valid.".to_string(),
            claims: Some(claims.into()),
        }
    }

    pub fn refused(code: FailureCode, err: &MarketError) -> Self {
        Self {
            success: false,
            code: Some(code),
            message: err.to_string(),
            claims: None,
        }
    }
}

#[derive(GraphQLObject)]
pub struct ListingPayload {
    pub success: bool,
    pub code: Option<FailureCode>,
    pub message: String,
    pub listing: Option<ListingType>,
}

impl ListingPayload {
    pub fn ok(detail: ListingDetail, message: &str) -> Self {
        Self {
            success: true,
            code: None,
            message: message.to_string(),
            listing: Some(ListingType(detail)),
        }
    }

    pub fn refused(code: FailureCode, err: &MarketError) -> Self {
        Self {
            success: false,
            code: Some(code),
            message: err.to_string(),
            listing: None,
        }
    }
}

#[derive(GraphQLObject)]
pub struct DeleteImagePayload {
    pub success: bool,
    pub code: Option<FailureCode>,
    pub message: String,
    pub image_id: i32,
}

impl DeleteImagePayload {
    pub fn ok(image_id: i32) -> Self {
        Self {
            success: true,
            code: None,
            message: "Image deleted.".to_string(),
            image_id,
        }
    }

    pub fn refused(image_id: i32, code: FailureCode, err: &MarketError) -> Self {
        Self {
            success: false,
            code: Some(code),
            message: err.to_string(),
            image_id,
        }
    }
}

#[derive(GraphQLObject)]
pub struct UploadUrlPayload {
    pub success: bool,
    pub code: Option<FailureCode>,
    pub message: String,
    /// PUT target; the upload must send the same `Content-Type`
    pub signed_url: Option<String>,
    pub public_url: Option<String>,
    pub object_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UploadUrlPayload {
    pub fn ok(grant: UploadGrant) -> Self {
        Self {
            success: true,
            code: None,
            message: "Upload URL issued.".to_string(),
            signed_url: Some(grant.signed_url),
            public_url: Some(grant.public_url),
            object_name: Some(grant.object_name),
            expires_at: Some(grant.expires_at),
        }
    }

    pub fn refused(code: FailureCode, err: &MarketError) -> Self {
        Self {
            success: false,
            code: Some(code),
            message: err.to_string(),
            signed_url: None,
            public_url: None,
            object_name: None,
            expires_at: None,
        }
    }
}
