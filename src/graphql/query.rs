use juniper::{graphql_object, FieldResult};

use super::types::{ListingType, UserType};
use super::{server_error, Context};
use crate::database::models::ListingFilter;

pub struct Query;

#[graphql_object(context = Context)]
impl Query {
    /// Every account, ordered by id
    async fn users(context: &Context) -> FieldResult<Vec<UserType>> {
        let users = context
            .services()
            .store
            .list_users()
            .await
            .map_err(|e| server_error(e.into()))?;
        Ok(users.into_iter().map(UserType).collect())
    }

    async fn user(context: &Context, id: i32) -> FieldResult<Option<UserType>> {
        let user = context
            .services()
            .store
            .find_user(id)
            .await
            .map_err(|e| server_error(e.into()))?;
        Ok(user.map(UserType))
    }

    /// The caller, or null when the request carries no valid token
    async fn me(context: &Context) -> Option<UserType> {
        context.viewer().await.cloned().map(UserType)
    }

    /// Newest first. Sold listings are hidden unless `includeSold` is set or
    /// `sold` asks for them explicitly.
    async fn listings(
        context: &Context,
        search: Option<String>,
        owner_id: Option<i32>,
        include_sold: Option<bool>,
        sold: Option<bool>,
    ) -> FieldResult<Vec<ListingType>> {
        let filter = ListingFilter {
            search,
            owner_id,
            include_sold: include_sold.unwrap_or(false),
            sold,
        };
        let listings = context
            .services()
            .listings
            .list(&filter)
            .await
            .map_err(server_error)?;
        Ok(listings.into_iter().map(ListingType).collect())
    }

    async fn listing(context: &Context, id: i32) -> FieldResult<Option<ListingType>> {
        let listing = context
            .services()
            .listings
            .get(id)
            .await
            .map_err(server_error)?;
        Ok(listing.map(ListingType))
    }

    async fn my_listings(
        context: &Context,
        include_sold: Option<bool>,
    ) -> FieldResult<Vec<ListingType>> {
        let viewer = context.viewer().await;
        let listings = context
            .services()
            .listings
            .mine(viewer, include_sold.unwrap_or(false))
            .await
            .map_err(server_error)?;
        Ok(listings.into_iter().map(ListingType).collect())
    }
}
