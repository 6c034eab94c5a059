//! Session resolution for cookie and bearer auth.
//!
//! Sessions are created by the login service; this module only reads them.

use axum::http::{
    HeaderMap, StatusCode,
    header::{AUTHORIZATION, COOKIE},
};
use sha2::{Digest, Sha256};
use tracing::error;

use super::storage::{Identity, IdentityStore};

pub const SESSION_COOKIE_NAME: &str = "verimail_session";

/// Hash a session token so raw values never touch the database.
/// The hash is used for lookups when the cookie is presented.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Resolve a session cookie or bearer token into the identity it belongs to.
///
/// Returns `Ok(None)` when the token is missing, unknown or expired.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    store: &dyn IdentityStore,
) -> Result<Option<Identity>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let token_hash = hash_session_token(&token);
    match store.identity_for_session(&token_hash).await {
        Ok(identity) => Ok(identity),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let Some((key, val)) = pair.trim().split_once('=') else {
            continue;
        };
        let val = val.trim();
        if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::super::storage::MemoryIdentityStore;
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; verimail_session=abc123; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("verimail_session=cookie"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  bearer-token "));
        assert_eq!(
            extract_session_token(&headers),
            Some("bearer-token".to_string())
        );
    }

    #[test]
    fn ignores_empty_or_foreign_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        headers.insert(COOKIE, HeaderValue::from_static("verimail_session=; other=1"));
        assert_eq!(extract_session_token(&headers), None);
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn hash_session_token_stable() {
        assert_eq!(hash_session_token("token"), hash_session_token("token"));
        assert_ne!(hash_session_token("token"), hash_session_token("other"));
        assert_eq!(hash_session_token("token").len(), 32);
    }

    #[tokio::test]
    async fn authenticate_session_resolves_identity() {
        let store = MemoryIdentityStore::new();
        store.insert_identity(Identity::new(7, "alice@example.com")).await;
        store.insert_session("secret-token", 7).await;

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("verimail_session=secret-token"));
        let identity = authenticate_session(&headers, &store).await;
        assert_eq!(identity.ok().flatten().map(|identity| identity.id), Some(7));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("verimail_session=unknown"));
        assert_eq!(authenticate_session(&headers, &store).await, Ok(None));
    }
}
