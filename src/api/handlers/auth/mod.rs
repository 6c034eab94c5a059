//! Verification handlers and supporting modules.
//!
//! This module coordinates session resolution, signed link issuing/checking,
//! per-user throttling, and the notice/verify/resend endpoints.
//!
//! ## Check Order
//!
//! Every endpoint resolves the session first; guests are redirected to the login
//! route before any other work. Verify and resend are then throttled per user
//! (6 attempts per minute by default) before touching links or the email sender.
//!
//! ## Signing Key
//!
//! Links are signed with a single HMAC key passed on the command line. All
//! instances must share it, otherwise links issued by one instance are rejected
//! by another.
//!
//! > **Warning:** Rotating the key invalidates every outstanding link.

pub(crate) mod principal;
mod rate_limit;
pub(crate) mod session;
pub(crate) mod signed_link;
mod state;
mod storage;
pub(crate) mod verification;

pub use rate_limit::{
    NoopRateLimiter, RateLimitAction, RateLimitDecision, RateLimiter, WindowRateLimiter,
};
pub use session::{SESSION_COOKIE_NAME, hash_session_token};
pub use signed_link::{LinkError, LinkSigner, SignedLink, email_verification_hash};
pub use state::{AuthConfig, AuthState};
pub use storage::{Identity, IdentityStore, MemoryIdentityStore, PgIdentityStore};
pub use verification::{NOTICE_PATH, RESEND_PATH, VERIFY_PATH};
