use anyhow::{Context, Result};
use base64ct::{Base64, Encoding};
use rand::{RngCore, rngs::OsRng};
use std::io::Write;

use crate::api::handlers::auth::signed_link::MIN_SIGNING_KEY_LEN;

/// Generate a random signing key, base64 encoded.
#[must_use]
pub fn generate() -> String {
    let mut key = [0u8; MIN_SIGNING_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    Base64::encode_string(&key)
}

/// Print a fresh signing key to stdout.
/// # Errors
/// Returns an error if stdout cannot be written.
pub fn execute() -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", generate()).context("Failed to write signing key")
}
