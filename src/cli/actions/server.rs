use crate::api::{
    self,
    email::{EmailSender, LogEmailSender, RelayEmailSender},
    handlers::auth::{AuthConfig, AuthState, LinkSigner, PgIdentityStore, WindowRateLimiter},
};
use anyhow::{Context, Result};
use secrecy::SecretSlice;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub signing_key: SecretSlice<u8>,
    pub link_ttl_seconds: u64,
    pub login_path: String,
    pub home_path: String,
    pub mail_relay_url: Option<String>,
    pub throttle_max_attempts: u32,
    pub throttle_window_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signer cannot be built, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let signer = LinkSigner::new(&args.signing_key, &args.base_url)?;

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let email_sender: Arc<dyn EmailSender> = match &args.mail_relay_url {
        Some(url) => {
            let sender = RelayEmailSender::new(url)?;
            info!("Delivering verification emails through {}", sender.url());
            Arc::new(sender)
        }
        None => {
            info!("No mail relay configured, verification emails are only logged");
            Arc::new(LogEmailSender)
        }
    };

    let auth_config = AuthConfig::new()
        .with_link_ttl_seconds(args.link_ttl_seconds)
        .with_login_path(args.login_path)
        .with_home_path(args.home_path);

    debug!("Auth config: {:?}", auth_config);

    let auth_state = Arc::new(AuthState::new(
        auth_config,
        signer,
        Arc::new(PgIdentityStore::new(pool)),
        email_sender,
        Arc::new(WindowRateLimiter::new(
            args.throttle_max_attempts,
            Duration::from_secs(args.throttle_window_seconds),
        )),
    ));

    api::new(args.port, auth_state).await
}
