//! Authenticated principal extraction.
//!
//! Flow Overview: read the session cookie (or bearer token), resolve it to a
//! user, and hand the principal to the handler. Guests never reach handler
//! logic; they are redirected to the login route first.

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};

use super::session::authenticate_session;
use super::state::AuthState;
use super::storage::Identity;

/// Authenticated user context derived from the session.
#[derive(Clone, Debug)]
pub struct Principal {
    pub identity: Identity,
}

/// Resolve the session into a principal, or build the response that ends the request.
pub async fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Principal, Response> {
    match authenticate_session(headers, auth_state.store()).await {
        Ok(Some(identity)) => Ok(Principal { identity }),
        Ok(None) => Err(Redirect::to(auth_state.config().login_path()).into_response()),
        Err(status) => Err(status.into_response()),
    }
}
