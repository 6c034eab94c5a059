//! Identity storage for verification flows.
//!
//! Users and sessions are owned by the user-management service. This service
//! reads them and flips `email_verified_at` exactly once per user. The write is
//! conditional on the column still being `NULL`, so concurrent verifications
//! of the same user converge on a single timestamp.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{Instrument, info_span};

use super::session::hash_session_token;
use super::signed_link::email_verification_hash;
use crate::api::handlers::now_unix_seconds;

/// A user whose email address may or may not be verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub email_verified_at_unix: Option<i64>,
}

impl Identity {
    #[must_use]
    pub fn new(id: i64, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            email_verified_at_unix: None,
        }
    }

    #[must_use]
    pub fn verified_at(mut self, unix_seconds: i64) -> Self {
        self.email_verified_at_unix = Some(unix_seconds);
        self
    }

    #[must_use]
    pub fn has_verified_email(&self) -> bool {
        self.email_verified_at_unix.is_some()
    }

    /// Hash embedded in verification links for this user's current address.
    #[must_use]
    pub fn verification_hash(&self) -> String {
        email_verification_hash(&self.email)
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve an unexpired session hash to its user.
    async fn identity_for_session(&self, session_hash: &[u8]) -> Result<Option<Identity>>;

    /// Stamp `email_verified_at` if it is still unset.
    ///
    /// Returns `true` when this call performed the write.
    async fn mark_email_verified(&self, id: i64) -> Result<bool>;

    /// Cheap liveness probe used by `/health`.
    async fn ping(&self) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn identity_for_session(&self, session_hash: &[u8]) -> Result<Option<Identity>> {
        let query = r"
            SELECT u.id,
                   u.email,
                   EXTRACT(EPOCH FROM u.email_verified_at)::BIGINT AS email_verified_at_unix
            FROM user_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.session_hash = $1
              AND s.expires_at > NOW()
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(session_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        Ok(row.map(|row| Identity {
            id: row.get("id"),
            email: row.get("email"),
            email_verified_at_unix: row.get("email_verified_at_unix"),
        }))
    }

    async fn mark_email_verified(&self, id: i64) -> Result<bool> {
        let query = r"
            UPDATE users
            SET email_verified_at = NOW()
            WHERE id = $1
              AND email_verified_at IS NULL
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark email verified")?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    identities: HashMap<i64, Identity>,
    sessions: HashMap<Vec<u8>, i64>,
}

/// In-process store for tests and local runs without Postgres.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    state: RwLock<MemoryState>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_identity(&self, identity: Identity) {
        let mut state = self.state.write().await;
        state.identities.insert(identity.id, identity);
    }

    /// Register a raw session token for a user; only its hash is kept.
    pub async fn insert_session(&self, token: &str, user_id: i64) {
        let mut state = self.state.write().await;
        state.sessions.insert(hash_session_token(token), user_id);
    }

    pub async fn identity(&self, id: i64) -> Option<Identity> {
        self.state.read().await.identities.get(&id).cloned()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn identity_for_session(&self, session_hash: &[u8]) -> Result<Option<Identity>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(session_hash)
            .and_then(|user_id| state.identities.get(user_id))
            .cloned())
    }

    async fn mark_email_verified(&self, id: i64) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.identities.get_mut(&id) {
            Some(identity) if identity.email_verified_at_unix.is_none() => {
                let now = i64::try_from(now_unix_seconds()).unwrap_or(i64::MAX);
                identity.email_verified_at_unix = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
