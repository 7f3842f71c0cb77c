//! Outbound user notifications
//!
//! Delivery is best effort: [`notify_in_background`] runs the send on its own
//! task and only logs a failure, so no request ever waits on the mail relay.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid mail address: {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// SMTP relay settings
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Relay host; an empty value disables SMTP delivery
    pub relay: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Plain connection without TLS (local relays only)
    pub insecure: bool,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            relay: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from_email: "noreply@simplebank.local".to_string(),
            from_name: "Simple Bank".to_string(),
            insecure: false,
            timeout: Duration::from_secs(10),
        }
    }
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        !self.relay.trim().is_empty()
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let address: Address = config
            .from_email
            .parse()
            .map_err(|e| NotifyError::Address(format!("{}: {}", config.from_email, e)))?;
        let from_name = (!config.from_name.is_empty()).then(|| config.from_name.clone());

        let builder = if config.insecure {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.relay)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.relay)
                .map_err(|e| NotifyError::Transport(e.to_string()))?
        };

        let mut builder = builder.port(config.port).timeout(Some(config.timeout));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(from_name, address),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| NotifyError::Address(format!("{}: {}", to, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        tracing::debug!(to = %to, subject = %subject, "Notification sent");
        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, to: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        tracing::info!(to = %to, subject = %subject, "Notification (SMTP not configured)");
        Ok(())
    }
}

/// Pick the SMTP notifier when a relay is configured, otherwise log only
pub fn notifier_from_config(config: &SmtpConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    if config.is_configured() {
        Ok(Arc::new(SmtpNotifier::new(config)?))
    } else {
        Ok(Arc::new(LogNotifier))
    }
}

/// Fire-and-forget delivery
pub fn notify_in_background(notifier: Arc<dyn Notifier>, to: String, subject: String, body: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&to, &subject, &body).await {
            tracing::warn!(to = %to, error = %e, "Notification failed");
        }
    });
}

pub const WELCOME_SUBJECT: &str = "Welcome to Simple Bank!";

pub fn welcome_body(username: &str) -> String {
    format!(
        "Hello {},\n\nThank you for registering at Simple Bank.",
        username
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_smtp_falls_back_to_log() {
        let config = SmtpConfig::default();
        assert!(!config.is_configured());
        assert!(notifier_from_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let config = SmtpConfig {
            relay: "localhost".to_string(),
            insecure: true,
            from_email: "not an address".to_string(),
            ..Default::default()
        };
        assert!(matches!(SmtpNotifier::new(&config), Err(NotifyError::Address(_))));
    }

    #[test]
    fn test_welcome_body() {
        assert_eq!(
            welcome_body("alice"),
            "Hello alice,\n\nThank you for registering at Simple Bank."
        );
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.notify("a@b.c", "s", "b").await.is_ok());
    }
}
