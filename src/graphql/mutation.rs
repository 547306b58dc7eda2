use juniper::{graphql_object, FieldResult};
use rust_decimal::Decimal;

use super::types::{
    AuthPayload, DeleteImagePayload, ListingPayload, UploadUrlPayload, VerifyTokenPayload,
};
use super::{settle, Context};
use crate::services::{CreateListing, Registration, UpdateListing};

pub struct Mutation;

#[graphql_object(context = Context)]
impl Mutation {
    async fn login(context: &Context, email: String, password: String) -> FieldResult<AuthPayload> {
        let result = context.services().credentials.login(&email, &password).await;
        settle(
            result,
            |grant| AuthPayload::granted(grant, "Login successful"),
            AuthPayload::refused,
        )
    }

    async fn register(
        context: &Context,
        username: String,
        email: String,
        password: String,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> FieldResult<AuthPayload> {
        let registration = Registration {
            username,
            email,
            password,
            first_name,
            last_name,
        };
        let result = context.services().credentials.register(registration).await;
        settle(
            result,
            |grant| AuthPayload::granted(grant, "Registration successful"),
            AuthPayload::refused,
        )
    }

    /// Decode a token without touching the account it names.
    fn verify_token(context: &Context, token: String) -> FieldResult<VerifyTokenPayload> {
        let result = context.services().credentials.verify_token(&token);
        settle(result, VerifyTokenPayload::ok, VerifyTokenPayload::refused)
    }

    /// Exchange an unexpired token for a new seven-day token.
    async fn refresh_token(context: &Context, token: String) -> FieldResult<AuthPayload> {
        let result = context.services().credentials.refresh_token(&token).await;
        settle(
            result,
            |grant| AuthPayload::granted(grant, "Token refreshed"),
            AuthPayload::refused,
        )
    }

    async fn create_listing(
        context: &Context,
        title: String,
        description: String,
        price: Decimal,
        image_urls: Option<Vec<String>>,
    ) -> FieldResult<ListingPayload> {
        let input = CreateListing {
            title,
            description,
            price,
            image_urls: image_urls.unwrap_or_default(),
        };
        let viewer = context.viewer().await;
        let result = context.services().listings.create(viewer, input).await;
        settle(
            result,
            |detail| ListingPayload::ok(detail, "Listing created."),
            ListingPayload::refused,
        )
    }

    /// Field changes, image additions and image removals apply together or
    /// not at all. Removal ids that belong to another listing are ignored.
    async fn update_listing(
        context: &Context,
        id: i32,
        title: Option<String>,
        description: Option<String>,
        price: Option<Decimal>,
        add_image_urls: Option<Vec<String>>,
        remove_image_ids: Option<Vec<i32>>,
        sold: Option<bool>,
    ) -> FieldResult<ListingPayload> {
        let input = UpdateListing {
            title,
            description,
            price,
            sold,
            add_image_urls: add_image_urls.unwrap_or_default(),
            remove_image_ids: remove_image_ids.unwrap_or_default(),
        };
        let viewer = context.viewer().await;
        let result = context.services().listings.update(viewer, id, input).await;
        settle(
            result,
            |detail| ListingPayload::ok(detail, "Listing updated."),
            ListingPayload::refused,
        )
    }

    async fn set_listing_sold(context: &Context, id: i32, sold: bool) -> FieldResult<ListingPayload> {
        let viewer = context.viewer().await;
        let result = context.services().listings.set_sold(viewer, id, sold).await;
        let message = if sold {
            "Listing marked as sold."
        } else {
            "Listing restored."
        };
        settle(
            result,
            |detail| ListingPayload::ok(detail, message),
            ListingPayload::refused,
        )
    }

    async fn delete_listing_image(context: &Context, image_id: i32) -> FieldResult<DeleteImagePayload> {
        let viewer = context.viewer().await;
        let result = context.services().listings.delete_image(viewer, image_id).await;
        settle(
            result,
            |()| DeleteImagePayload::ok(image_id),
            |code, err| DeleteImagePayload::refused(image_id, code, err),
        )
    }

    /// Signed PUT URL for one listing image, valid for ten minutes.
    async fn generate_listing_image_upload_url(
        context: &Context,
        filename: String,
        content_type: String,
    ) -> FieldResult<UploadUrlPayload> {
        let viewer = context.viewer().await;
        let result = context
            .services()
            .uploads
            .authorize_upload(viewer, &filename, &content_type)
            .await;
        settle(result, UploadUrlPayload::ok, UploadUrlPayload::refused)
    }
}
