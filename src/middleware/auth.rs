use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::auth::TokenKeys;
use crate::database::models::User;
use crate::database::repository::Store;

/// Raw `Authorization` header value, if present and valid UTF-8.
pub fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Pull the token out of an `Authorization` value.
///
/// Accepts `Bearer <token>` (scheme matched case-insensitively) and falls back
/// to treating the whole trimmed value as a raw token.
pub fn extract_token(header: &str) -> Option<&str> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => Some(header),
    }
}

/// Resolves a request's credential to a user, or to nobody.
///
/// Never fails: malformed headers, bad signatures, expired tokens, unknown
/// subjects and store errors all resolve to anonymous.
#[derive(Clone)]
pub struct IdentityResolver {
    keys: Arc<TokenKeys>,
    store: Arc<dyn Store>,
}

impl IdentityResolver {
    pub fn new(keys: Arc<TokenKeys>, store: Arc<dyn Store>) -> Self {
        Self { keys, store }
    }

    pub async fn resolve(&self, authorization: Option<&str>) -> Option<User> {
        let token = extract_token(authorization?)?;

        let claims = match self.keys.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Rejected bearer token: {}", e);
                return None;
            }
        };

        let user_id = claims.user_id()?;
        match self.store.find_user(user_id).await {
            Ok(user) => {
                if user.is_none() {
                    tracing::debug!("Token subject {} has no matching user", user_id);
                }
                user
            }
            Err(e) => {
                tracing::warn!("Identity lookup for user {} failed: {}", user_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{user_fixture, MemoryStore};
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};

    #[test]
    fn extracts_bearer_and_raw_tokens() {
        assert_eq!(extract_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_token("bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_token("  abc.def  "), Some("abc.def"));
        assert_eq!(extract_token("Token abc.def"), Some("Token abc.def"));
        assert_eq!(extract_token("   "), None);
    }

    #[test]
    fn reads_authorization_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(authorization_header(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(authorization_header(&headers).as_deref(), Some("Bearer xyz"));
    }

    async fn resolver_with_user() -> (IdentityResolver, Arc<TokenKeys>, User) {
        let store = Arc::new(MemoryStore::new());
        let user = store.seed_user(user_fixture(0, "carol")).await;
        let keys = Arc::new(TokenKeys::new("resolver-secret", Duration::days(7)).unwrap());
        (IdentityResolver::new(keys.clone(), store), keys, user)
    }

    #[tokio::test]
    async fn resolves_valid_bearer_token() {
        let (resolver, keys, user) = resolver_with_user().await;
        let token = keys.issue(&user).unwrap();

        let bearer = format!("Bearer {token}");
        let resolved = resolver.resolve(Some(&bearer)).await.unwrap();
        assert_eq!(resolved.id, user.id);

        let raw = resolver.resolve(Some(&token)).await.unwrap();
        assert_eq!(raw.id, user.id);
    }

    #[tokio::test]
    async fn anonymous_on_any_failure() {
        let (resolver, keys, user) = resolver_with_user().await;

        assert!(resolver.resolve(None).await.is_none());
        assert!(resolver.resolve(Some("")).await.is_none());
        assert!(resolver.resolve(Some("Bearer not-a-jwt")).await.is_none());

        let expired = keys.issue_at(&user, Utc::now() - Duration::days(30)).unwrap();
        assert!(resolver.resolve(Some(&expired)).await.is_none());

        let ghost = keys.issue(&user_fixture(999, "ghost")).unwrap();
        assert!(resolver.resolve(Some(&ghost)).await.is_none());
    }
}
