use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::database::{DatabaseManager, PgStore, Store};
use crate::handlers::{self, AppState};
use crate::services::Services;
use crate::storage::{GcsSigner, ObjectStorage};

/// Connect, migrate if configured, and serve until the process is stopped.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config.database).await?;
    if config.database.run_migrations {
        DatabaseManager::migrate(&pool).await?;
    }
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    let storage = GcsSigner::from_config(&config.storage)?
        .map(|signer| Arc::new(signer) as Arc<dyn ObjectStorage>);
    if storage.is_none() {
        warn!("GCS_BUCKET_NAME is not set; upload URL requests will fail");
    }

    let services = Services::new(config, store, storage)?;
    let app = handlers::app(AppState::new(services), &config.security);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!("Marketplace API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(&pool).await?;
    println!("Migrations applied");
    Ok(())
}
