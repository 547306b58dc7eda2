use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{
    Listing, ListingChanges, ListingDetail, ListingFilter, ListingImage, NewListing, NewUser, User,
    UserFlags,
};
use crate::database::repository::{ListingRepository, Store, UserRepository};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
                            is_active, is_staff, date_joined";
const LISTING_COLUMNS: &str = "id, user_id, title, description, price, date_listed, sold";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach owners and images to a batch of listing rows, keeping row order.
    async fn hydrate(&self, listings: Vec<Listing>) -> Result<Vec<ListingDetail>, DatabaseError> {
        if listings.is_empty() {
            return Ok(Vec::new());
        }

        let listing_ids: Vec<i32> = listings.iter().map(|l| l.id).collect();
        let mut owner_ids: Vec<i32> = listings.iter().map(|l| l.user_id).collect();
        owner_ids.sort_unstable();
        owner_ids.dedup();

        let owners: Vec<User> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(&owner_ids)
        .fetch_all(&self.pool)
        .await?;
        let owners: HashMap<i32, User> = owners.into_iter().map(|u| (u.id, u)).collect();

        let images: Vec<ListingImage> = sqlx::query_as(
            "SELECT id, listing_id, image_url FROM listing_images \
             WHERE listing_id = ANY($1) ORDER BY id",
        )
        .bind(&listing_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut images_by_listing: HashMap<i32, Vec<ListingImage>> = HashMap::new();
        for image in images {
            images_by_listing.entry(image.listing_id).or_default().push(image);
        }

        listings
            .into_iter()
            .map(|listing| {
                let owner = owners.get(&listing.user_id).cloned().ok_or_else(|| {
                    DatabaseError::QueryError(format!(
                        "listing {} references missing user {}",
                        listing.id, listing.user_id
                    ))
                })?;
                let images = images_by_listing.remove(&listing.id).unwrap_or_default();
                Ok(ListingDetail {
                    listing,
                    owner,
                    images,
                })
            })
            .collect()
    }

    async fn hydrate_one(&self, listing: Listing) -> Result<ListingDetail, DatabaseError> {
        let id = listing.id;
        self.hydrate(vec![listing])
            .await?
            .pop()
            .ok_or_else(|| DatabaseError::NotFound(format!("listing {id}")))
    }
}

/// Escape LIKE metacharacters so the term matches literally.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_image_rows<'a>(builder: &mut QueryBuilder<'a, Postgres>, listing_id: i32, urls: &'a [String]) {
    builder.push_values(urls, |mut row, url| {
        row.push_bind(listing_id).push_bind(url);
    });
}

#[async_trait]
impl UserRepository for PgStore {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 ORDER BY id LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, DatabaseError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, DatabaseError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let row = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name, is_active, is_staff)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_staff)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_user_flags(
        &self,
        username: &str,
        flags: UserFlags,
    ) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as(&format!(
            r#"
            UPDATE users
            SET is_active = COALESCE($2, is_active),
                is_staff = COALESCE($3, is_staff)
            WHERE username = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(flags.is_active)
        .bind(flags.is_staff)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl ListingRepository for PgStore {
    async fn search_listings(
        &self,
        filter: &ListingFilter,
    ) -> Result<Vec<ListingDetail>, DatabaseError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LISTING_COLUMNS} FROM listings WHERE TRUE"));

        if let Some(owner_id) = filter.owner_id {
            builder.push(" AND user_id = ").push_bind(owner_id);
        }
        if let Some(term) = filter.search_term() {
            let pattern = like_pattern(term);
            builder
                .push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(sold) = filter.sold_constraint() {
            builder.push(" AND sold = ").push_bind(sold);
        }
        builder.push(" ORDER BY date_listed DESC NULLS LAST, id DESC");

        let listings: Vec<Listing> = builder.build_query_as().fetch_all(&self.pool).await?;
        self.hydrate(listings).await
    }

    async fn find_listing(&self, id: i32) -> Result<Option<ListingDetail>, DatabaseError> {
        let listing: Option<Listing> =
            sqlx::query_as(&format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match listing {
            Some(listing) => Ok(Some(self.hydrate_one(listing).await?)),
            None => Ok(None),
        }
    }

    async fn create_listing(&self, new: NewListing) -> Result<ListingDetail, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let listing: Listing = sqlx::query_as(&format!(
            r#"
            INSERT INTO listings (user_id, title, description, price, date_listed, sold)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.date_listed)
        .fetch_one(&mut *tx)
        .await?;

        if !new.image_urls.is_empty() {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO listing_images (listing_id, image_url) ");
            push_image_rows(&mut builder, listing.id, &new.image_urls);
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        self.hydrate_one(listing).await
    }

    async fn apply_listing_changes(
        &self,
        id: i32,
        changes: &ListingChanges,
    ) -> Result<Option<ListingDetail>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let listing: Option<Listing> = sqlx::query_as(&format!(
            r#"
            UPDATE listings
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                sold = COALESCE($5, sold)
            WHERE id = $1
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(changes.sold)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(listing) = listing else {
            tx.rollback().await?;
            return Ok(None);
        };

        if !changes.add_image_urls.is_empty() {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO listing_images (listing_id, image_url) ");
            push_image_rows(&mut builder, id, &changes.add_image_urls);
            builder.build().execute(&mut *tx).await?;
        }

        if !changes.remove_image_ids.is_empty() {
            sqlx::query("DELETE FROM listing_images WHERE listing_id = $1 AND id = ANY($2)")
                .bind(id)
                .bind(&changes.remove_image_ids)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(self.hydrate_one(listing).await?))
    }

    async fn set_listing_sold(
        &self,
        id: i32,
        sold: bool,
    ) -> Result<Option<ListingDetail>, DatabaseError> {
        let listing: Option<Listing> = sqlx::query_as(&format!(
            "UPDATE listings SET sold = $2 WHERE id = $1 RETURNING {LISTING_COLUMNS}"
        ))
        .bind(id)
        .bind(sold)
        .fetch_optional(&self.pool)
        .await?;

        match listing {
            Some(listing) => Ok(Some(self.hydrate_one(listing).await?)),
            None => Ok(None),
        }
    }

    async fn find_image(&self, image_id: i32) -> Result<Option<ListingImage>, DatabaseError> {
        let image = sqlx::query_as("SELECT id, listing_id, image_url FROM listing_images WHERE id = $1")
            .bind(image_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(image)
    }

    async fn delete_image(&self, image_id: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM listing_images WHERE id = $1")
            .bind(image_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
