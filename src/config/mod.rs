use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Lifetime of an identity token issued at login or registration.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Lifetime of a pre-signed upload URL.
pub const UPLOAD_URL_TTL_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process-wide settings, built once at startup and handed to the components
/// that need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub token_ttl_days: i64,
    pub cors_origins: Vec<String>,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub upload_prefix: String,
    pub endpoint: String,
    pub hmac_access_id: Option<String>,
    #[serde(skip_serializing)]
    pub hmac_secret: Option<String>,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// `DATABASE_URL` and `SECRET_KEY` are required; everything else falls back
    /// to the preset selected by `APP_ENV`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        // Server overrides
        if let Some(v) = env::var("MARKETPLACE_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
        {
            self.server.port = parse_value("PORT", &v)?;
        }
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = parse_value("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = parse_value("DATABASE_RUN_MIGRATIONS", &v)?;
        }

        // Security overrides
        if let Ok(v) = env::var("SECRET_KEY") {
            self.security.secret_key = v;
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let Ok(v) = env::var("ARGON2_MEMORY_KIB") {
            self.security.argon2_memory_kib = parse_value("ARGON2_MEMORY_KIB", &v)?;
        }
        if let Ok(v) = env::var("ARGON2_ITERATIONS") {
            self.security.argon2_iterations = parse_value("ARGON2_ITERATIONS", &v)?;
        }
        if let Ok(v) = env::var("ARGON2_PARALLELISM") {
            self.security.argon2_parallelism = parse_value("ARGON2_PARALLELISM", &v)?;
        }

        // Storage overrides
        if let Ok(v) = env::var("GCS_BUCKET_NAME") {
            self.storage.bucket = non_empty(v);
        }
        if let Ok(v) = env::var("GCS_UPLOAD_PREFIX") {
            self.storage.upload_prefix = v;
        }
        if let Ok(v) = env::var("GCS_ENDPOINT") {
            self.storage.endpoint = v;
        }
        if let Ok(v) = env::var("GCS_HMAC_ACCESS_ID") {
            self.storage.hmac_access_id = non_empty(v);
        }
        if let Ok(v) = env::var("GCS_HMAC_SECRET") {
            self.storage.hmac_secret = non_empty(v);
        }

        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.security.secret_key.is_empty() {
            return Err(ConfigError::Missing("SECRET_KEY"));
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            security: SecurityConfig {
                secret_key: String::new(),
                token_ttl_days: TOKEN_TTL_DAYS,
                cors_origins: Vec::new(),
                argon2_memory_kib: 19 * 1024,
                argon2_iterations: 2,
                argon2_parallelism: 1,
            },
            storage: StorageConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        let mut config = Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            ..Self::development()
        };
        config.security.argon2_memory_kib = 64 * 1024;
        config.security.argon2_iterations = 3;
        config
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            upload_prefix: "listings".to_string(),
            endpoint: "https://storage.googleapis.com".to_string(),
            hmac_access_id: None,
            hmac_secret: None,
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
