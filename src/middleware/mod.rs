pub mod auth;

pub use auth::{authorization_header, extract_token, IdentityResolver};
