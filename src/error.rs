// Domain error types shared by the services and the GraphQL layer
use thiserror::Error;

use crate::auth::{JwtError, PasswordError};
use crate::database::manager::DatabaseError;
use crate::storage::StorageError;

/// Reason a request was refused, reported to clients alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, juniper::GraphQLEnum)]
pub enum FailureCode {
    /// Input was rejected (negative price, non-image upload, duplicate username...)
    Validation,
    /// No identity could be resolved from the request
    Unauthenticated,
    /// The identity is known but may not touch the resource
    Forbidden,
    NotFound,
    InvalidCredentials,
    AccountDisabled,
    /// A token handed in for checking or refresh is malformed, expired or
    /// names no account
    InvalidToken,
}

/// Errors from the service layer
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required.")]
    AuthenticationRequired,

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User account is disabled")]
    AccountDisabled,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl MarketError {
    pub fn validation(message: impl Into<String>) -> Self {
        MarketError::Validation(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        MarketError::PermissionDenied(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        MarketError::NotFound(message.into())
    }

    /// Client-facing reason for refusals; `None` for server-side failures.
    pub fn failure_code(&self) -> Option<FailureCode> {
        match self {
            MarketError::Validation(_) => Some(FailureCode::Validation),
            MarketError::AuthenticationRequired => Some(FailureCode::Unauthenticated),
            MarketError::PermissionDenied(_) => Some(FailureCode::Forbidden),
            MarketError::NotFound(_) => Some(FailureCode::NotFound),
            MarketError::InvalidCredentials => Some(FailureCode::InvalidCredentials),
            MarketError::AccountDisabled => Some(FailureCode::AccountDisabled),
            MarketError::InvalidToken => Some(FailureCode::InvalidToken),
            MarketError::Storage(_)
            | MarketError::Token(_)
            | MarketError::Password(_)
            | MarketError::Database(_) => None,
        }
    }

    /// Error code for server-side failures surfaced as GraphQL errors
    pub fn error_code(&self) -> &'static str {
        match self {
            MarketError::Validation(_) => "VALIDATION_ERROR",
            MarketError::AuthenticationRequired => "UNAUTHENTICATED",
            MarketError::PermissionDenied(_) => "FORBIDDEN",
            MarketError::NotFound(_) => "NOT_FOUND",
            MarketError::InvalidCredentials => "INVALID_CREDENTIALS",
            MarketError::AccountDisabled => "ACCOUNT_DISABLED",
            MarketError::InvalidToken => "INVALID_TOKEN",
            MarketError::Storage(StorageError::NotConfigured) => "CONFIGURATION_ERROR",
            MarketError::Storage(_) => "BAD_GATEWAY",
            MarketError::Token(_) | MarketError::Password(_) | MarketError::Database(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }

    /// Client-safe message. Server-side detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            MarketError::Storage(StorageError::NotConfigured) => {
                "Object storage is not configured.".to_string()
            }
            MarketError::Storage(_) => "Object storage request failed.".to_string(),
            MarketError::Token(_) | MarketError::Password(_) | MarketError::Database(_) => {
                "An error occurred while processing your request.".to_string()
            }
            other => other.to_string(),
        }
    }
}
