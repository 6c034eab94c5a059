//! Signed, expiring verification links.
//!
//! Flow Overview: the issuer hashes the user's email, signs
//! `(route, id, hash, expires)` with HMAC-SHA256 and renders
//! `{base}/email/verify/{id}/{hash}?expires=..&signature=..`. The verifier
//! recomputes the MAC over the received params and compares in constant time.
//! Links are never stored; a link stays usable until it expires.

use anyhow::{Context, Result, anyhow, bail};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Route name covered by every signature, so a MAC cannot be replayed on another route.
pub const VERIFY_ROUTE_NAME: &str = "verification.verify";

/// Keys shorter than a SHA-256 digest are rejected at startup.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("missing signature")]
    MissingSignature,
    #[error("malformed signature")]
    MalformedSignature,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("link expired")]
    Expired,
}

/// Parameters received on the verify route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedLink {
    pub id: i64,
    pub hash: String,
    pub expires: Option<u64>,
    pub signature: Option<String>,
}

/// Hash of the address a user must prove ownership of.
#[must_use]
pub fn email_verification_hash(email: &str) -> String {
    hex::encode(Sha256::digest(email.as_bytes()))
}

/// Issues and checks verification links with an explicit signing key.
#[derive(Clone)]
pub struct LinkSigner {
    mac: HmacSha256,
    base_url: Url,
}

impl LinkSigner {
    /// Build a signer from a secret key and the public base URL used in links.
    ///
    /// # Errors
    /// Returns an error if the key is too short or the base URL cannot carry a path.
    pub fn new(key: &SecretSlice<u8>, base_url: &str) -> Result<Self> {
        let key = key.expose_secret();
        if key.len() < MIN_SIGNING_KEY_LEN {
            bail!(
                "signing key must be at least {MIN_SIGNING_KEY_LEN} bytes, got {}",
                key.len()
            );
        }

        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Base URL must be hierarchical: {base_url}");
        }

        let mac = HmacSha256::new_from_slice(key)
            .map_err(|err| anyhow!("failed to initialize link signer: {err}"))?;

        Ok(Self { mac, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Render a signed verification URL for a user.
    ///
    /// `expires_at` is a unix timestamp; `None` yields a link that never expires.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be assembled.
    pub fn issue(&self, id: i64, email: &str, expires_at: Option<u64>) -> Result<Url> {
        let hash = email_verification_hash(email);
        let signature = self.sign(id, &hash, expires_at);

        let id = id.to_string();
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("Base URL cannot carry path segments"))?
            .pop_if_empty()
            .extend(["email", "verify", id.as_str(), hash.as_str()]);

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            if let Some(expires_at) = expires_at {
                query.append_pair("expires", &expires_at.to_string());
            }
            query.append_pair("signature", &signature);
        }

        Ok(url)
    }

    /// Hex MAC over the canonical encoding of the link parameters.
    #[must_use]
    pub fn sign(&self, id: i64, hash: &str, expires_at: Option<u64>) -> String {
        hex::encode(self.canonical_mac(id, hash, expires_at).finalize().into_bytes())
    }

    /// Check signature and expiry of a received link against `now` (unix seconds).
    ///
    /// # Errors
    /// Returns the first failing check; callers map every variant to `403`.
    pub fn verify(&self, link: &SignedLink, now: u64) -> Result<(), LinkError> {
        let signature = link
            .signature
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(LinkError::MissingSignature)?;
        let signature = hex::decode(signature).map_err(|_| LinkError::MalformedSignature)?;

        self.canonical_mac(link.id, &link.hash, link.expires)
            .verify_slice(&signature)
            .map_err(|_| LinkError::InvalidSignature)?;

        // Checked after the MAC so an unsigned expiry tells the caller nothing.
        match link.expires {
            Some(expires) if now > expires => Err(LinkError::Expired),
            _ => Ok(()),
        }
    }

    fn canonical_mac(&self, id: i64, hash: &str, expires_at: Option<u64>) -> HmacSha256 {
        // Length-prefixed fields keep the encoding unambiguous.
        let mut mac = self.mac.clone();
        let id = id.to_be_bytes();
        let fields: [&[u8]; 3] = [VERIFY_ROUTE_NAME.as_bytes(), &id, hash.as_bytes()];
        for field in fields {
            mac.update(&(field.len() as u64).to_be_bytes());
            mac.update(field);
        }
        match expires_at {
            Some(expires) => {
                mac.update(&[1]);
                mac.update(&expires.to_be_bytes());
            }
            None => mac.update(&[0]),
        }
        mac
    }
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner")
            .field("key", &"***")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}
