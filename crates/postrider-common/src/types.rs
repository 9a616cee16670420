//! Common types for Postrider

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for email messages
pub type EmailMessageId = Uuid;

/// Unique identifier for email attachments
pub type AttachmentId = Uuid;

/// Unique identifier for webhook events
pub type WebhookEventId = Uuid;

/// Unique identifier for the actor that caused a message to be created
pub type ActorId = Uuid;

/// Lifecycle status of an email message.
///
/// Forward-only: the preparer moves New to Ready (or Error), the
/// dispatcher moves Ready through Pending to Sent/Error (or Canceled
/// on a cooldown hit), and webhook reconciliation advances Sent-derived
/// states based on delivery-event timestamps. Unknown strings are
/// rejected at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    New,
    Ready,
    Pending,
    Sent,
    Delivered,
    Opened,
    Bounced,
    Spam,
    Canceled,
    Error,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::New => "new",
            MessageStatus::Ready => "ready",
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Opened => "opened",
            MessageStatus::Bounced => "bounced",
            MessageStatus::Spam => "spam",
            MessageStatus::Canceled => "canceled",
            MessageStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(MessageStatus::New),
            "ready" => Ok(MessageStatus::Ready),
            "pending" => Ok(MessageStatus::Pending),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "opened" => Ok(MessageStatus::Opened),
            "bounced" => Ok(MessageStatus::Bounced),
            "spam" => Ok(MessageStatus::Spam),
            "canceled" => Ok(MessageStatus::Canceled),
            "error" => Ok(MessageStatus::Error),
            other => Err(crate::Error::Validation(format!(
                "Unknown message status: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for MessageStatus {
    type Error = crate::Error;

    fn try_from(s: String) -> Result<Self, crate::Error> {
        s.parse()
    }
}

/// Lifecycle status of a webhook event.
///
/// New on ingest, Pending while the reconciler runs, then Processed or
/// Error. Never regresses and never re-processed once terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    New,
    Pending,
    Processed,
    Error,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::New => "new",
            WebhookStatus::Pending => "pending",
            WebhookStatus::Processed => "processed",
            WebhookStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WebhookStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(WebhookStatus::New),
            "pending" => Ok(WebhookStatus::Pending),
            "processed" => Ok(WebhookStatus::Processed),
            "error" => Ok(WebhookStatus::Error),
            other => Err(crate::Error::Validation(format!(
                "Unknown webhook status: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for WebhookStatus {
    type Error = crate::Error;

    fn try_from(s: String) -> Result<Self, crate::Error> {
        s.parse()
    }
}
