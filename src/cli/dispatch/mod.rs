//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an action: the API server with its full
//! verification configuration, or one of the utility subcommands.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{CMD_KEYGEN, verification};
use anyhow::{Context, Result};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or the signing key is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if matches.subcommand_name() == Some(CMD_KEYGEN) {
        return Ok(Action::Keygen);
    }

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let verification_opts = verification::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        base_url: verification_opts.base_url,
        signing_key: verification_opts.signing_key,
        link_ttl_seconds: verification_opts.link_ttl_seconds,
        login_path: verification_opts.login_path,
        home_path: verification_opts.home_path,
        mail_relay_url: verification_opts.mail_relay_url,
        throttle_max_attempts: verification_opts.throttle_max_attempts,
        throttle_window_seconds: verification_opts.throttle_window_seconds,
    }))
}
