use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{Claims, PasswordHasher, TokenKeys};
use crate::database::models::{NewUser, User};
use crate::database::repository::Store;
use crate::error::MarketError;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length
pub const MAX_USERNAME_LENGTH: usize = 150;

pub const MAX_EMAIL_LENGTH: usize = 254;

/// Applies to first and last name alike
pub const MAX_NAME_LENGTH: usize = 150;

/// A freshly issued identity token and the account it names.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Verifies credentials and mints identity tokens.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn Store>,
    keys: Arc<TokenKeys>,
    hasher: PasswordHasher,
}

impl CredentialService {
    pub fn new(store: Arc<dyn Store>, keys: Arc<TokenKeys>, hasher: PasswordHasher) -> Self {
        Self {
            store,
            keys,
            hasher,
        }
    }

    /// Log in by email and password.
    ///
    /// Unknown email and wrong password both report `InvalidCredentials`.
    /// `AccountDisabled` is only reported once the password has been verified.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, MarketError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            self.hasher.verify_decoy(password).await?;
            info!("Login rejected: unknown email");
            return Err(MarketError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            info!("Login rejected for user {}: wrong password", user.id);
            return Err(MarketError::InvalidCredentials);
        }

        if !user.is_active {
            warn!("Login rejected for user {}: account disabled", user.id);
            return Err(MarketError::AccountDisabled);
        }

        let token = self.keys.issue(&user)?;
        info!("User {} logged in", user.id);
        Ok(AuthGrant { token, user })
    }

    /// Check a token's signature and expiry and hand back its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, MarketError> {
        self.keys.decode(token).map_err(|e| {
            info!("Token rejected: {}", e);
            MarketError::InvalidToken
        })
    }

    /// Swap a still-valid token for a fresh one with a full lifetime.
    ///
    /// The subject must still exist and be active.
    pub async fn refresh_token(&self, token: &str) -> Result<AuthGrant, MarketError> {
        let claims = self.verify_token(token)?;
        let user_id = claims.user_id().ok_or(MarketError::InvalidToken)?;
        let Some(user) = self.store.find_user(user_id).await? else {
            info!("Token refresh rejected: user {} no longer exists", user_id);
            return Err(MarketError::InvalidToken);
        };

        if !user.is_active {
            warn!("Token refresh rejected for user {}: account disabled", user.id);
            return Err(MarketError::AccountDisabled);
        }

        let token = self.keys.issue(&user)?;
        info!("User {} refreshed their token", user.id);
        Ok(AuthGrant { token, user })
    }

    /// Create an account and log it in.
    pub async fn register(&self, registration: Registration) -> Result<AuthGrant, MarketError> {
        let user = self.create_account(registration, false).await?;
        let token = self.keys.issue(&user)?;
        info!("Registered user {} ({})", user.id, user.username);
        Ok(AuthGrant { token, user })
    }

    /// Validate and insert an account without issuing a token.
    pub async fn create_account(
        &self,
        registration: Registration,
        is_staff: bool,
    ) -> Result<User, MarketError> {
        validate_username_format(&registration.username).map_err(MarketError::Validation)?;
        validate_email_format(&registration.email).map_err(MarketError::Validation)?;
        validate_password(&registration.password).map_err(MarketError::Validation)?;
        for (field, value) in [
            ("First name", &registration.first_name),
            ("Last name", &registration.last_name),
        ] {
            if let Some(value) = value {
                validate_name(field, value).map_err(MarketError::Validation)?;
            }
        }

        if self.store.username_exists(&registration.username).await? {
            return Err(MarketError::validation("Username already exists"));
        }
        if self.store.email_exists(&registration.email).await? {
            return Err(MarketError::validation("Email already exists"));
        }

        let password_hash = self.hasher.hash(&registration.password).await?;
        let user = self
            .store
            .insert_user(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
                first_name: registration.first_name.unwrap_or_default(),
                last_name: registration.last_name.unwrap_or_default(),
                is_staff,
            })
            .await?;
        Ok(user)
    }
}

/// Letters, digits and `@.+-_`, 1 to 150 characters.
pub fn validate_username_format(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username cannot be empty".to_string());
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(format!(
            "Username must be at most {MAX_USERNAME_LENGTH} characters"
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err("Username can only contain letters, numbers, and @/./+/-/_".to_string());
    }

    Ok(())
}

pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(format!("Email must be at most {MAX_EMAIL_LENGTH} characters"));
    }

    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None)
            if !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err("Invalid email format".to_string()),
    }
}

pub fn validate_name(field: &str, value: &str) -> Result<(), String> {
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("{field} must be at most {MAX_NAME_LENGTH} characters"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    Ok(())
}
