use crate::config::SmtpCredentials;
use crate::email_template::InterventionEmail;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;
use uuid::Uuid;

/// Failure reported by the mail provider, carried verbatim to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct MailError(pub String);

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MailError {}

/// Sends intervention emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends `email` to `smtp.recipient` and returns the message id.
    async fn send(&self, smtp: &SmtpCredentials, email: &InterventionEmail)
        -> Result<String, MailError>;
}

/// Delivers through an SMTP server using lettre.
///
/// A transport is built per send from the credentials resolved for that
/// request. `secure` selects implicit TLS, otherwise STARTTLS is required.
#[derive(Debug, Clone, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }

    fn transport(smtp: &SmtpCredentials) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let builder = if smtp.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        }
        .map_err(|e| MailError(format!("Invalid SMTP host '{}': {}", smtp.host, e)))?;

        Ok(builder
            .port(smtp.port)
            .credentials(Credentials::new(smtp.user.clone(), smtp.pass.clone()))
            .build())
    }
}

/// Builds the MIME message (plain text + HTML alternative) with an explicit
/// Message-ID so the caller can report it.
pub fn build_message(
    smtp: &SmtpCredentials,
    email: &InterventionEmail,
    message_id: &str,
) -> Result<Message, MailError> {
    let from: Mailbox = smtp
        .from
        .parse()
        .map_err(|e| MailError(format!("Invalid SMTP_FROM address '{}': {}", smtp.from, e)))?;
    let to: Mailbox = smtp.recipient.parse().map_err(|e| {
        MailError(format!(
            "Invalid INTERVENTION_RECIPIENT address '{}': {}",
            smtp.recipient, e
        ))
    })?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .message_id(Some(message_id.to_string()))
        .multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))
        .map_err(|e| MailError(format!("Failed to build email: {}", e)))
}

/// `<uuid@domain>` using the sender's domain.
pub fn new_message_id(from: &str) -> String {
    let domain = from
        .parse::<Mailbox>()
        .map(|mailbox| mailbox.email.domain().to_string())
        .unwrap_or_else(|_| "localhost".to_string());
    format!("<{}@{}>", Uuid::new_v4(), domain)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        smtp: &SmtpCredentials,
        email: &InterventionEmail,
    ) -> Result<String, MailError> {
        let message_id = new_message_id(&smtp.from);
        let message = build_message(smtp, email, &message_id)?;
        let transport = Self::transport(smtp)?;

        tracing::info!(
            "Sending intervention email via {}:{} to {}",
            smtp.host,
            smtp.port,
            smtp.recipient
        );

        let response = transport
            .send(message)
            .await
            .map_err(|e| MailError(e.to_string()))?;

        tracing::info!(
            "✓ Intervention email accepted ({}): {}",
            response.code(),
            message_id
        );
        Ok(message_id)
    }
}
