use super::auth::AuthState;
use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Identity store is healthy", body = [Health]),
        (status = 503, description = "Identity store is unhealthy", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let result = match auth_state.store().ping().await {
        Ok(()) => Ok(()),
        Err(error) => {
            error!("Failed to ping identity store: {:#}", error);

            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    // Create a health struct
    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    // Create headers using the map method
    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        });

    // Unwrap the headers or provide a default value (empty headers) in case of an error
    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    if result.is_ok() {
        debug!("Identity store is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Identity store is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogEmailSender;
    use crate::api::handlers::auth::{
        AuthConfig, IdentityStore, Identity, LinkSigner, NoopRateLimiter,
    };
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use secrecy::SecretSlice;

    struct DownStore;

    #[async_trait]
    impl IdentityStore for DownStore {
        async fn identity_for_session(&self, _session_hash: &[u8]) -> Result<Option<Identity>> {
            Err(anyhow!("down"))
        }

        async fn mark_email_verified(&self, _id: i64) -> Result<bool> {
            Err(anyhow!("down"))
        }

        async fn ping(&self) -> Result<()> {
            Err(anyhow!("down"))
        }
    }

    fn state(store: Arc<dyn IdentityStore>) -> Result<Arc<AuthState>> {
        let signer = LinkSigner::new(&SecretSlice::from(vec![1u8; 32]), "https://verimail.dev")?;
        Ok(Arc::new(AuthState::new(
            AuthConfig::new(),
            signer,
            store,
            Arc::new(LogEmailSender),
            Arc::new(NoopRateLimiter),
        )))
    }

    #[tokio::test]
    async fn health_ok_with_reachable_store() -> Result<()> {
        let store = Arc::new(crate::api::handlers::auth::MemoryIdentityStore::new());
        let response = health(Method::GET, Extension(state(store)?))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(
            value.get("database").and_then(serde_json::Value::as_str),
            Some("ok")
        );
        assert_eq!(
            value.get("name").and_then(serde_json::Value::as_str),
            Some(env!("CARGO_PKG_NAME"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn health_unavailable_when_store_is_down() -> Result<()> {
        let response = health(Method::OPTIONS, Extension(state(Arc::new(DownStore))?))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(body.is_empty());
        Ok(())
    }
}
