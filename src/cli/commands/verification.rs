use anyhow::{Context, anyhow};
use base64ct::{Base64, Encoding};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretSlice;

use crate::api::handlers::auth::signed_link::MIN_SIGNING_KEY_LEN;

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_LINK_TTL_SECONDS: &str = "link-ttl-seconds";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_HOME_PATH: &str = "home-path";
pub const ARG_MAIL_RELAY_URL: &str = "mail-relay-url";
pub const ARG_THROTTLE_MAX_ATTEMPTS: &str = "throttle-max-attempts";
pub const ARG_THROTTLE_WINDOW_SECONDS: &str = "throttle-window-seconds";

#[derive(Debug)]
pub struct Options {
    pub base_url: String,
    pub signing_key: SecretSlice<u8>,
    pub link_ttl_seconds: u64,
    pub login_path: String,
    pub home_path: String,
    pub mail_relay_url: Option<String>,
    pub throttle_max_attempts: u32,
    pub throttle_window_seconds: u64,
}

impl Options {
    /// Parse link, redirect, delivery and throttle arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing key is missing, not base64, or too short.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let signing_key = matches
            .get_one::<String>(ARG_SIGNING_KEY)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_SIGNING_KEY}"))?;
        let signing_key = decode_signing_key(signing_key)?;

        let read_string = |id: &str, default: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            base_url: read_string(ARG_BASE_URL, "http://localhost:8080"),
            signing_key,
            link_ttl_seconds: matches
                .get_one::<u64>(ARG_LINK_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
            login_path: read_string(ARG_LOGIN_PATH, "/login"),
            home_path: read_string(ARG_HOME_PATH, "/home"),
            // Ignore empty strings which clap passes through if env vars are set to ""
            mail_relay_url: matches
                .get_one::<String>(ARG_MAIL_RELAY_URL)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            throttle_max_attempts: matches
                .get_one::<u32>(ARG_THROTTLE_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(6),
            throttle_window_seconds: matches
                .get_one::<u64>(ARG_THROTTLE_WINDOW_SECONDS)
                .copied()
                .unwrap_or(60),
        })
    }
}

/// Decode a base64 signing key and enforce the minimum length.
///
/// # Errors
/// Returns an error if the value is not standard base64 or decodes to fewer
/// than 32 bytes.
pub fn decode_signing_key(value: &str) -> anyhow::Result<SecretSlice<u8>> {
    let bytes = Base64::decode_vec(value.trim())
        .map_err(|err| anyhow!("{err}"))
        .with_context(|| format!("--{ARG_SIGNING_KEY} must be standard base64"))?;
    if bytes.len() < MIN_SIGNING_KEY_LEN {
        return Err(anyhow!(
            "--{ARG_SIGNING_KEY} must decode to at least {MIN_SIGNING_KEY_LEN} bytes, got {}",
            bytes.len()
        ));
    }
    Ok(SecretSlice::from(bytes))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_link_args(command);
    let command = with_redirect_args(command);
    with_delivery_args(command)
}

fn with_link_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL used to build verification links")
                .env("VERIMAIL_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("Base64 HMAC key for signing links (at least 32 bytes)")
                .long_help(
                    "Base64 HMAC key for signing verification links. Must decode to at least 32 bytes; generate one with `verimail keygen`.",
                )
                .env("VERIMAIL_SIGNING_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_LINK_TTL_SECONDS)
                .long(ARG_LINK_TTL_SECONDS)
                .help("Verification link lifetime in seconds")
                .env("VERIMAIL_LINK_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_redirect_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long(ARG_LOGIN_PATH)
                .help("Where guests are redirected")
                .env("VERIMAIL_LOGIN_PATH")
                .default_value("/login"),
        )
        .arg(
            Arg::new(ARG_HOME_PATH)
                .long(ARG_HOME_PATH)
                .help("Where verified users are redirected")
                .env("VERIMAIL_HOME_PATH")
                .default_value("/home"),
        )
}

fn with_delivery_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_RELAY_URL)
                .long(ARG_MAIL_RELAY_URL)
                .help("HTTP mail relay endpoint; emails are only logged when unset")
                .env("VERIMAIL_MAIL_RELAY_URL"),
        )
        .arg(
            Arg::new(ARG_THROTTLE_MAX_ATTEMPTS)
                .long(ARG_THROTTLE_MAX_ATTEMPTS)
                .help("Verify/resend attempts allowed per user and window")
                .env("VERIMAIL_THROTTLE_MAX_ATTEMPTS")
                .default_value("6")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_THROTTLE_WINDOW_SECONDS)
                .long(ARG_THROTTLE_WINDOW_SECONDS)
                .help("Throttle window in seconds")
                .env("VERIMAIL_THROTTLE_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn decode_signing_key_accepts_32_bytes() -> anyhow::Result<()> {
        let encoded = Base64::encode_string(&[7u8; 32]);
        let key = decode_signing_key(&encoded)?;
        assert_eq!(key.expose_secret(), &[7u8; 32][..]);
        Ok(())
    }

    #[test]
    fn decode_signing_key_rejects_short_and_invalid() {
        let short = Base64::encode_string(&[7u8; 16]);
        let err = decode_signing_key(&short).err().map(|err| err.to_string());
        assert!(err.is_some_and(|err| err.contains("at least 32 bytes")));

        assert!(decode_signing_key("not base64!").is_err());
    }
}
