//! # Verimail (signed-link email verification)
//!
//! `verimail` proves that a user owns the email address on their account. It
//! serves three routes behind the session of an already logged-in user:
//!
//! - **Notice** (`GET /email/verify`): tells unverified users to check their inbox.
//! - **Verify** (`GET /email/verify/{id}/{hash}`): consumes a signed, expiring link
//!   and stamps `email_verified_at`.
//! - **Resend** (`GET /email/resend`): issues a fresh link and hands it to the
//!   configured email sender.
//!
//! ## Signed Links
//!
//! Links carry the user id, a SHA-256 hash of the email address, an expiry and an
//! HMAC-SHA256 signature over all three. Nothing is stored server-side; a link is
//! valid exactly as long as its signature recomputes and its expiry is in the future.
//!
//! ## Authorization
//!
//! Guests are redirected to the login route before any link work happens. A valid
//! signature is not enough: the link must also belong to the caller, otherwise the
//! request is rejected with `403 Forbidden` and nothing is written.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
