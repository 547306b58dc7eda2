pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "marketplace-api")]
#[command(about = "Marketplace API - GraphQL server and account administration")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve,

    #[command(about = "Apply pending database migrations and exit")]
    Migrate,

    #[command(about = "Create an account")]
    CreateUser {
        #[arg(help = "Username")]
        username: String,
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password")]
        password: String,
        #[arg(long, help = "Grant staff rights")]
        staff: bool,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },

    #[command(about = "Enable or disable an account")]
    SetActive {
        #[arg(help = "Username")]
        username: String,
        #[arg(action = clap::ArgAction::Set, help = "true or false")]
        active: bool,
    },

    #[command(about = "Grant or revoke staff rights")]
    SetStaff {
        #[arg(help = "Username")]
        username: String,
        #[arg(action = clap::ArgAction::Set, help = "true or false")]
        staff: bool,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::server::serve(&config).await,
        Commands::Migrate => commands::server::migrate(&config).await,
        Commands::CreateUser {
            username,
            email,
            password,
            staff,
            first_name,
            last_name,
        } => {
            let registration = crate::services::Registration {
                username,
                email,
                password,
                first_name,
                last_name,
            };
            commands::user::create(&config, registration, staff, output_format).await
        }
        Commands::SetActive { username, active } => {
            let flags = crate::database::models::UserFlags {
                is_active: Some(active),
                ..Default::default()
            };
            commands::user::set_flags(&config, &username, flags, output_format).await
        }
        Commands::SetStaff { username, staff } => {
            let flags = crate::database::models::UserFlags {
                is_staff: Some(staff),
                ..Default::default()
            };
            commands::user::set_flags(&config, &username, flags, output_format).await
        }
    }
}
