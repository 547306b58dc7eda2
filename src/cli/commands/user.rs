use std::sync::Arc;

use anyhow::bail;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::models::{User, UserFlags};
use crate::database::{DatabaseManager, PgStore, Store};
use crate::services::{Registration, Services};

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let pool = DatabaseManager::connect(&config.database).await?;
    Ok(Arc::new(PgStore::new(pool)))
}

pub async fn create(
    config: &AppConfig,
    registration: Registration,
    is_staff: bool,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let services = Services::new(config, open_store(config).await?, None)?;
    let user = services
        .credentials
        .create_account(registration, is_staff)
        .await?;
    print_user("Created", &user, output_format)
}

pub async fn set_flags(
    config: &AppConfig,
    username: &str,
    flags: UserFlags,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let Some(user) = store.update_user_flags(username, flags).await? else {
        bail!("No user named '{}'", username);
    };
    print_user("Updated", &user, output_format)
}

fn print_user(action: &str, user: &User, output_format: OutputFormat) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let out = json!({ "success": true, "data": user });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!(
                "{} user {} (id {}, active: {}, staff: {})",
                action, user.username, user.id, user.is_active, user.is_staff
            );
        }
    }
    Ok(())
}
