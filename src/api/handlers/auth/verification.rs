//! Email verification endpoints.

use axum::{
    extract::{
        Extension, Path, Query,
        rejection::{PathRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::IntoParams;

use crate::api::email::verification_message;
use crate::api::handlers::now_unix_seconds;

use super::principal::require_auth;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::signed_link::SignedLink;
use super::state::AuthState;

pub const NOTICE_PATH: &str = "/email/verify";
pub const VERIFY_PATH: &str = "/email/verify/:id/:hash";
pub const RESEND_PATH: &str = "/email/resend";

/// Query half of a signed verification link.
#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct SignatureParams {
    /// Unix timestamp after which the link is rejected.
    pub expires: Option<String>,
    /// Hex HMAC-SHA256 over route, id, hash and expiry.
    pub signature: Option<String>,
}

/// Tell unverified users to check their inbox.
#[utoipa::path(
    get,
    path = "/email/verify",
    responses(
        (status = 200, description = "Verification notice", content_type = "text/html", body = String),
        (status = 303, description = "Guest (to login) or already verified (to home)")
    ),
    tag = "verification"
)]
pub async fn notice(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };

    if principal.identity.has_verified_email() {
        return Redirect::to(auth_state.config().home_path()).into_response();
    }

    (StatusCode::OK, Html(notice_page(&principal.identity.email))).into_response()
}

/// Consume a signed link and mark the caller's email as verified.
#[utoipa::path(
    get,
    path = "/email/verify/{id}/{hash}",
    params(
        ("id" = i64, Path, description = "User id the link was issued for"),
        ("hash" = String, Path, description = "Hex SHA-256 of the user's email"),
        SignatureParams
    ),
    responses(
        (status = 303, description = "Verified (to home) or guest (to login)"),
        (status = 403, description = "Invalid, expired or foreign link", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "verification"
)]
#[instrument(skip_all)]
pub async fn verify(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    query: Result<Query<SignatureParams>, QueryRejection>,
) -> Response {
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let identity = principal.identity;

    if auth_state
        .rate_limiter()
        .check_user(identity.id, RateLimitAction::VerifyEmail)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    // Anything that does not parse cannot have been issued by us. Extraction
    // errors are handled here, after auth, so guests still go to login.
    let (Ok(Path((id, hash))), Ok(Query(params))) = (path, query) else {
        debug!("rejected verification link with undecodable parameters");
        return forbidden();
    };
    let Ok(link_id) = id.parse::<i64>() else {
        debug!("rejected verification link with non-numeric id");
        return forbidden();
    };
    let expires = match params.expires.as_deref().map(str::parse::<u64>) {
        None => None,
        Some(Ok(expires)) => Some(expires),
        Some(Err(_)) => {
            debug!("rejected verification link with malformed expiry");
            return forbidden();
        }
    };
    let link = SignedLink {
        id: link_id,
        hash,
        expires,
        signature: params.signature,
    };

    if let Err(err) = auth_state.signer().verify(&link, now_unix_seconds()) {
        debug!(user_id = identity.id, error = %err, "rejected verification link");
        return forbidden();
    }

    // A valid signature for someone else is still not yours to use.
    if link.id != identity.id {
        warn!(
            user_id = identity.id,
            link_user_id = link.id,
            "verification link belongs to another user"
        );
        return forbidden();
    }

    if link.hash != identity.verification_hash() {
        debug!(user_id = identity.id, "verification link hash does not match email");
        return forbidden();
    }

    if identity.has_verified_email() {
        return Redirect::to(auth_state.config().home_path()).into_response();
    }

    match auth_state.store().mark_email_verified(identity.id).await {
        Ok(updated) => {
            if updated {
                info!(user_id = identity.id, "email verified");
            }
            Redirect::to(auth_state.config().home_path()).into_response()
        }
        Err(err) => {
            error!("Failed to mark email verified: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response()
        }
    }
}

/// Send a fresh verification link to the caller.
#[utoipa::path(
    get,
    path = "/email/resend",
    responses(
        (status = 303, description = "Sent (to notice), already verified (to home) or guest (to login)"),
        (status = 429, description = "Rate limited", body = String),
        (status = 500, description = "Delivery failed", body = String)
    ),
    tag = "verification"
)]
#[instrument(skip_all)]
pub async fn resend(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let principal = match require_auth(&headers, &auth_state).await {
        Ok(principal) => principal,
        Err(response) => return response,
    };
    let identity = principal.identity;

    if auth_state
        .rate_limiter()
        .check_user(identity.id, RateLimitAction::ResendVerification)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    if identity.has_verified_email() {
        return Redirect::to(auth_state.config().home_path()).into_response();
    }

    let expires_at = now_unix_seconds().saturating_add(auth_state.config().link_ttl_seconds());
    let message = auth_state
        .signer()
        .issue(identity.id, &identity.email, Some(expires_at))
        .and_then(|url| verification_message(&identity, &url, expires_at));
    let message = match message {
        Ok(message) => message,
        Err(err) => {
            error!("Failed to build verification email: {err}");
            return send_failed();
        }
    };

    if let Err(err) = auth_state.email_sender().send(&message).await {
        error!(user_id = identity.id, "Failed to send verification email: {err}");
        return send_failed();
    }

    info!(user_id = identity.id, "verification email sent");
    Redirect::to(NOTICE_PATH).into_response()
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Invalid verification link".to_string()).into_response()
}

fn send_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to send verification email".to_string(),
    )
        .into_response()
}

fn notice_page(email: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Verify Your Email Address</title></head>
<body>
<main>
<h1>Verify Your Email Address</h1>
<p>Before proceeding, please check <strong>{email}</strong> for a verification link.</p>
<p>If you did not receive the email, <a href="{RESEND_PATH}">click here to request another</a>.</p>
</main>
</body>
</html>
"#,
        email = escape_html(email)
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_page_links_to_resend() {
        let page = notice_page("alice@example.com");
        assert!(page.contains("Verify Your Email Address"));
        assert!(page.contains("href=\"/email/resend\""));
        assert!(page.contains("alice@example.com"));
    }

    #[test]
    fn notice_page_escapes_email() {
        let page = notice_page("<script>@example.com");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;@example.com"));
    }
}
