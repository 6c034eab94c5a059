//! Verification email delivery.
//!
//! The resend flow builds an `EmailMessage` and hands it to an `EmailSender`.
//! The sender decides how to deliver (HTTP relay, log, in-memory) and returns
//! `Ok`/`Err`; a failed send is reported to the caller so the user can retry.
//!
//! - `LogEmailSender` logs the payload instead of sending (local dev default).
//! - `RelayEmailSender` POSTs the message as JSON to a mail relay.
//! - `RecordingEmailSender` keeps every message in memory for assertions.
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::sync::Mutex;
use tracing::{Instrument, info, info_span};
use url::Url;

use crate::api::handlers::auth::Identity;

pub const VERIFY_EMAIL_TEMPLATE: &str = "verify_email";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub recipient_id: i64,
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Build the verification message for a freshly issued link.
///
/// # Errors
/// Returns an error if the payload cannot be serialized.
pub fn verification_message(
    identity: &Identity,
    verification_url: &Url,
    expires_at: u64,
) -> Result<EmailMessage> {
    let payload = json!({
        "verification_url": verification_url.as_str(),
        "expires_at": expires_at,
    });
    Ok(EmailMessage {
        recipient_id: identity.id,
        to_email: identity.email.clone(),
        template: VERIFY_EMAIL_TEMPLATE.to_string(),
        payload_json: serde_json::to_string(&payload)
            .context("failed to serialize verification email payload")?,
    })
}

/// Email delivery abstraction used by the resend flow.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to report the failure.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            recipient_id = message.recipient_id,
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

/// Sender that forwards messages to an HTTP mail relay.
#[derive(Clone, Debug)]
pub struct RelayEmailSender {
    client: Client,
    url: Url,
}

impl RelayEmailSender {
    /// Build a relay sender for the given endpoint.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid mail relay URL: {url}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("Mail relay URL must use http or https: {url}"));
        }
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build mail relay HTTP client")?;
        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl EmailSender for RelayEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let span = info_span!(
            "mail.relay",
            http.method = "POST",
            http.url = %self.url,
            template = %message.template
        );
        let response = self
            .client
            .post(self.url.clone())
            .json(message)
            .send()
            .instrument(span)
            .await
            .context("failed to reach mail relay")?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow!("mail relay rejected message: {status}"))
        }
    }
}

/// Test double that records messages instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of messages with `template` sent to the given user.
    #[must_use]
    pub fn sent_to(&self, recipient_id: i64, template: &str) -> usize {
        self.sent()
            .iter()
            .filter(|message| message.recipient_id == recipient_id && message.template == template)
            .count()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut sent = match self.sent.lock() {
            Ok(sent) => sent,
            Err(poisoned) => poisoned.into_inner(),
        };
        sent.push(message.clone());
        Ok(())
    }
}
