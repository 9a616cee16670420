//! Outbound mail transport
//!
//! A fully prepared message is flattened into an [`OutboundEmail`] and
//! handed to a [`MailTransport`]. The SMTP implementation builds a
//! multipart MIME message with lettre; tests substitute a recording
//! transport.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use postrider_common::{Error, Result};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// Attachment content ready to go on the wire
#[derive(Debug, Clone)]
pub struct OutboundAttachment {
    pub filename: String,
    pub mimetype: String,
    pub content: Vec<u8>,
}

/// A rendered email ready for a transport
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub attachments: Vec<OutboundAttachment>,
}

/// Hands rendered emails to a delivery provider.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send one email, returning the provider message ids assigned to
    /// it. Exactly one id is expected per send.
    async fn send(&self, email: &OutboundEmail) -> Result<Vec<String>>;
}

/// Format a display name and address into an RFC 5322 mailbox.
///
/// A blank name yields the bare address. Names containing header
/// special characters are quoted, with embedded quotes and backslashes
/// escaped.
pub fn format_mailbox(name: &str, email: &str) -> String {
    const SPECIALS: &[char] = &[
        '(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"',
    ];

    let name = name.trim();
    let email = email.trim();

    if name.is_empty() {
        return email.to_string();
    }

    if name.contains(SPECIALS) {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\" <{}>", escaped, email)
    } else {
        format!("{} <{}>", name, email)
    }
}

/// SMTP relay settings
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpTransportConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_use_starttls")]
    pub use_starttls: bool,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_use_starttls() -> bool {
    true
}

/// SMTP transport backed by lettre
pub struct SmtpMailTransport {
    config: SmtpTransportConfig,
}

impl SmtpMailTransport {
    pub fn new(config: SmtpTransportConfig) -> Self {
        Self { config }
    }

    fn mailer(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if self.config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| Error::Transport(format!("Failed to configure SMTP relay: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        builder = builder.port(self.config.port);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

/// Build the MIME message for an outbound email.
///
/// Text and HTML bodies go into a multipart/alternative; attachments
/// wrap that in a multipart/mixed in their stored order.
fn build_mime(email: &OutboundEmail, message_id: &str) -> Result<Message> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|e| Error::Validation(format!("Invalid from address {:?}: {}", email.from, e)))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| Error::Validation(format!("Invalid to address {:?}: {}", email.to, e)))?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(&email.subject)
        .message_id(Some(message_id.to_string()));

    if let Some(reply_to) = &email.reply_to {
        let mailbox: Mailbox = reply_to.parse().map_err(|e| {
            Error::Validation(format!("Invalid reply-to address {:?}: {}", reply_to, e))
        })?;
        builder = builder.reply_to(mailbox);
    }

    let alternative = match &email.html_body {
        Some(html) => MultiPart::alternative()
            .singlepart(SinglePart::plain(email.text_body.clone()))
            .singlepart(SinglePart::html(html.clone())),
        None => MultiPart::alternative().singlepart(SinglePart::plain(email.text_body.clone())),
    };

    let mime = if email.attachments.is_empty() {
        builder.multipart(alternative)
    } else {
        let mut mixed = MultiPart::mixed().multipart(alternative);
        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.mimetype).map_err(|e| {
                Error::Validation(format!("Invalid mimetype {:?}: {}", attachment.mimetype, e))
            })?;
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }
        builder.multipart(mixed)
    };

    mime.map_err(|e| Error::Transport(format!("Failed to build MIME message: {}", e)))
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<Vec<String>> {
        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.config.host);
        let mime = build_mime(email, &message_id)?;

        let mailer = self.mailer()?;
        mailer
            .send(mime)
            .await
            .map_err(|e| Error::Transport(format!("SMTP send failed: {}", e)))?;

        info!(to = %email.to, %message_id, "Message handed to SMTP relay");

        Ok(vec![message_id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_mailbox_plain_name() {
        assert_eq!(
            format_mailbox("Support", "support@example.com"),
            "Support <support@example.com>"
        );
    }

    #[test]
    fn test_format_mailbox_blank_name_yields_bare_address() {
        assert_eq!(format_mailbox("  ", " bob@example.com "), "bob@example.com");
        assert_eq!(format_mailbox("", "bob@example.com"), "bob@example.com");
    }

    #[test]
    fn test_format_mailbox_quotes_special_characters() {
        assert_eq!(
            format_mailbox("Bob Jones, Jr.", "bob@example.com"),
            "\"Bob Jones, Jr.\" <bob@example.com>"
        );
    }

    #[test]
    fn test_format_mailbox_escapes_embedded_quotes() {
        assert_eq!(
            format_mailbox("Bob \"The Builder\" Jones.", "bob@example.com"),
            "\"Bob \\\"The Builder\\\" Jones.\" <bob@example.com>"
        );
    }

    fn sample_email() -> OutboundEmail {
        OutboundEmail {
            from: format_mailbox("Example", "noreply@example.com"),
            to: format_mailbox("Bob Jones, Jr.", "bob@example.com"),
            reply_to: Some("support@example.com".to_string()),
            subject: "A subject".to_string(),
            text_body: "Hello".to_string(),
            html_body: Some("<p>Hello</p>".to_string()),
            attachments: vec![OutboundAttachment {
                filename: "report.pdf".to_string(),
                mimetype: "application/pdf".to_string(),
                content: b"%PDF-1.4".to_vec(),
            }],
        }
    }

    #[test]
    fn test_build_mime_with_alternative_and_attachment() {
        let mime = build_mime(&sample_email(), "<abc@smtp.example.com>").unwrap();
        let rendered = String::from_utf8(mime.formatted()).unwrap();
        assert!(rendered.contains("A subject"));
        assert!(rendered.contains("report.pdf"));
    }

    #[test]
    fn test_build_mime_rejects_bad_mimetype() {
        let mut email = sample_email();
        email.attachments[0].mimetype = "not a mimetype".to_string();
        let err = build_mime(&email, "<abc@smtp.example.com>").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
