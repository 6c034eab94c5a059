//! Verification state and configuration.

use std::sync::Arc;

use super::rate_limit::RateLimiter;
use super::signed_link::LinkSigner;
use super::storage::IdentityStore;
use crate::api::email::EmailSender;

const DEFAULT_LINK_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_HOME_PATH: &str = "/home";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    link_ttl_seconds: u64,
    login_path: String,
    home_path: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            link_ttl_seconds: DEFAULT_LINK_TTL_SECONDS,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            home_path: DEFAULT_HOME_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_link_ttl_seconds(mut self, seconds: u64) -> Self {
        self.link_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: String) -> Self {
        self.login_path = path;
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: String) -> Self {
        self.home_path = path;
        self
    }

    #[must_use]
    pub fn link_ttl_seconds(&self) -> u64 {
        self.link_ttl_seconds
    }

    /// Where guests are sent.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Where callers land once verification is done (or was already done).
    #[must_use]
    pub fn home_path(&self) -> &str {
        &self.home_path
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AuthState {
    config: AuthConfig,
    signer: LinkSigner,
    store: Arc<dyn IdentityStore>,
    email_sender: Arc<dyn EmailSender>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        signer: LinkSigner,
        store: Arc<dyn IdentityStore>,
        email_sender: Arc<dyn EmailSender>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            config,
            signer,
            store,
            email_sender,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn signer(&self) -> &LinkSigner {
        &self.signer
    }

    pub(crate) fn store(&self) -> &dyn IdentityStore {
        self.store.as_ref()
    }

    pub(super) fn email_sender(&self) -> &dyn EmailSender {
        self.email_sender.as_ref()
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
