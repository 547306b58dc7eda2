use clap::Parser;
use tracing_subscriber::EnvFilter;

use marketplace_api::cli::{self, Cli};
use marketplace_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    init_tracing(&config);
    tracing::info!("Starting Marketplace API in {:?} mode", config.environment);

    if let Err(e) = cli::run(cli, config).await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise a per-environment default. `LOG_FORMAT=json`
/// switches to structured output.
fn init_tracing(config: &AppConfig) {
    let default_filter = if config.is_development() {
        "info,tower_http=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
