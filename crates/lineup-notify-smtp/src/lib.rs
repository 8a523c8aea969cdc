// # SMTP Notifier
//
// This crate provides the `Notifier` implementation that delivers reports by
// email. Text messages go through the same path: an SMS destination is simply
// an address at the carrier's email-to-SMS gateway.
//
// ## Providers
//
// The SMTP relay is derived from the sender's domain:
//
// | Domain  | Relay                   |
// |---------|-------------------------|
// | gmail   | smtp.gmail.com          |
// | outlook | smtp-mail.outlook.com   |
// | yahoo   | smtp.mail.yahoo.com     |
//
// Every relay is reached on port 587 with STARTTLS, logging in as the sender.
//
// ## Security Requirements
//
// - The password NEVER appears in logs or `Debug` output
// - An unknown provider is rejected at construction, not at first send

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use lineup_core::config::NotifyConfig;
use lineup_core::traits::Notifier;
use lineup_core::{Error, Result};

/// Submission port, upgraded with STARTTLS
pub const SMTP_PORT: u16 = 587;

/// SMTP command timeout
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Known providers and their relays
const SMTP_RELAYS: &[(&str, &str)] = &[
    ("gmail", "smtp.gmail.com"),
    ("outlook", "smtp-mail.outlook.com"),
    ("yahoo", "smtp.mail.yahoo.com"),
];

/// Provider of an address: first label of its domain, lowercased
///
/// `me@gmail.com` → `gmail`, `5551234567@vtext.com` → `vtext`
pub fn email_provider(address: &str) -> Option<String> {
    let (_, domain) = address.rsplit_once('@')?;
    let label = domain.split('.').next()?.trim();
    (!label.is_empty()).then(|| label.to_ascii_lowercase())
}

/// SMTP relay for a sender address
pub fn smtp_relay(sender: &str) -> Option<&'static str> {
    let provider = email_provider(sender)?;
    SMTP_RELAYS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, relay)| *relay)
}

/// Whether a destination reads full reports (an email provider) or short
/// texts (anything else, typically an SMS gateway)
pub fn is_email_destination(destination: &str) -> bool {
    smtp_relay(destination).is_some()
}

/// Notifier sending plain-text mail through the sender's provider
pub struct SmtpNotifier {
    sender: Mailbox,
    relay: &'static str,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

// Custom Debug implementation that never touches the credentials
impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("sender", &self.sender.email.to_string())
            .field("relay", &self.relay)
            .field("port", &SMTP_PORT)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl SmtpNotifier {
    /// Create a notifier logging in as `sender`
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the sender is not a valid address, its provider is
    ///   not supported, or the password is empty
    pub fn new(sender: &str, password: &str) -> Result<Self> {
        if password.is_empty() {
            return Err(Error::config(format!("Password for {} is empty", sender)));
        }

        let mailbox: Mailbox = sender
            .parse()
            .map_err(|e| Error::config(format!("Invalid sender address {}: {}", sender, e)))?;

        let relay = smtp_relay(sender).ok_or_else(|| {
            Error::config(format!(
                "Unsupported email provider for {} (expected one of: {})",
                sender,
                SMTP_RELAYS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(relay)
            .map_err(|e| Error::config(format!("Invalid SMTP relay {}: {}", relay, e)))?
            .port(SMTP_PORT)
            .timeout(Some(SMTP_TIMEOUT))
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();

        Ok(Self {
            sender: mailbox,
            relay,
            mailer,
        })
    }

    /// Create a notifier from the notification settings
    ///
    /// Returns `Ok(None)` when no sender is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>> {
        let Some(sender) = &config.sender else {
            return Ok(None);
        };
        let password = config.password.as_deref().unwrap_or_default();
        Self::new(sender, password).map(Some)
    }

    /// SMTP relay in use
    pub fn relay(&self) -> &str {
        self.relay
    }

    fn build_message(&self, destination: &str, subject: &str, body: &str) -> anyhow::Result<Message> {
        let to: Mailbox = destination
            .parse()
            .with_context(|| format!("invalid destination {}", destination))?;

        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("build message")
    }

    async fn deliver(&self, destination: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = self.build_message(destination, subject, body)?;
        self.mailer
            .send(message)
            .await
            .with_context(|| format!("send via {}", self.relay))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<()> {
        let kind = if is_email_destination(destination) {
            "an email"
        } else {
            "a text"
        };
        tracing::info!("Sending {} to {}", kind, destination);

        self.deliver(destination, subject, body)
            .await
            .map_err(|e| Error::notify(format!("{}: {:#}", destination, e)))?;

        tracing::info!("Message sent to {}", destination);
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "smtp"
    }
}
