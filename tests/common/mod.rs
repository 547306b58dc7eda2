// Shared setup for the Postgres-backed integration tests.
//
// Tests only run when TEST_DATABASE_URL points at a scratch database; without
// it every test returns early. Rows are never truncated, so each test works
// with its own uniquely named accounts.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use uuid::Uuid;

use marketplace_api::auth::{PasswordHasher, TokenKeys};
use marketplace_api::config::{DatabaseConfig, SecurityConfig, TOKEN_TTL_DAYS};
use marketplace_api::database::{DatabaseManager, PgStore};
use marketplace_api::services::Services;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Connect and migrate, or `None` when no test database is configured.
pub async fn test_store() -> Result<Option<Arc<PgStore>>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return Ok(None);
    };

    let config = DatabaseConfig {
        url,
        max_connections: 5,
        connection_timeout: 10,
        run_migrations: true,
    };
    let pool = DatabaseManager::connect(&config).await?;
    DatabaseManager::migrate(&pool).await?;
    Ok(Some(Arc::new(PgStore::new(pool))))
}

pub fn security() -> SecurityConfig {
    SecurityConfig {
        secret_key: TEST_SECRET.to_string(),
        token_ttl_days: TOKEN_TTL_DAYS,
        cors_origins: Vec::new(),
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
    }
}

pub fn services(store: Arc<PgStore>) -> Result<Services> {
    let security = security();
    let keys = Arc::new(TokenKeys::new(
        &security.secret_key,
        Duration::days(security.token_ttl_days),
    )?);
    let hasher = PasswordHasher::new(&security)?;
    Ok(Services::assemble(store, keys, hasher, None, "listings"))
}

/// A name no other test run will use.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

pub fn registration(prefix: &str) -> marketplace_api::services::Registration {
    let username = unique(prefix);
    marketplace_api::services::Registration {
        email: format!("{username}@example.com"),
        password: format!("{username}-password"),
        username,
        first_name: None,
        last_name: None,
    }
}
