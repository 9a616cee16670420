//! Database models

use chrono::{DateTime, Utc};
use postrider_common::types::{
    ActorId, AttachmentId, EmailMessageId, MessageStatus, WebhookEventId, WebhookStatus,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single outbound email and its lifecycle record.
///
/// Every send attempt is represented by a row; rows are never deleted
/// by the dispatch core.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: EmailMessageId,

    /// Externally shareable stable identifier
    pub public_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,

    /// Actor that caused the message to be created (weak reference)
    pub created_by: Option<ActorId>,

    pub sender_name: String,
    pub sender_email: String,
    pub to_name: String,
    pub to_email: String,
    pub reply_to_name: String,
    pub reply_to_email: String,

    pub subject: String,

    /// Hierarchical template slug, e.g. "core/email/password_reset"
    pub template_prefix: String,

    /// Context passed to the template renderer (JSON object)
    pub template_context: serde_json::Value,

    /// Message-ID assigned by the sending provider, unique once set
    pub message_id: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: MessageStatus,

    /// Populated only when status is Error or Canceled
    pub error_message: String,
}

/// Input for creating a new email message
#[derive(Debug, Clone)]
pub struct NewEmailMessage {
    pub created_by: Option<ActorId>,
    pub sender_name: String,
    pub sender_email: String,
    pub to_name: String,
    pub to_email: String,
    pub reply_to_name: String,
    pub reply_to_email: String,
    pub subject: String,
    pub template_prefix: String,
    pub template_context: serde_json::Value,
}

impl Default for NewEmailMessage {
    fn default() -> Self {
        Self {
            created_by: None,
            sender_name: String::new(),
            sender_email: String::new(),
            to_name: String::new(),
            to_email: String::new(),
            reply_to_name: String::new(),
            reply_to_email: String::new(),
            subject: String::new(),
            template_prefix: String::new(),
            template_context: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// File attachment bound to an email message.
///
/// Content lives in the blob store under `storage_path`; the original
/// filename is kept so the attachment can be reconstituted on send.
/// `position` orders an attachment relative to its siblings.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailAttachment {
    pub id: AttachmentId,
    pub email_message_id: EmailMessageId,
    pub storage_path: String,
    pub filename: String,
    pub mimetype: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new attachment record
#[derive(Debug, Clone)]
pub struct NewEmailAttachment {
    pub email_message_id: EmailMessageId,
    pub storage_path: String,
    pub filename: String,
    pub mimetype: String,
    pub position: i32,
}

/// A delivery-event notification received from the mail provider.
///
/// The link to an email message is weak: deleting a message neither
/// requires nor blocks deleting its webhook events.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Raw payload (JSON object)
    pub body: serde_json::Value,

    /// String-valued request headers
    pub headers: serde_json::Value,

    /// Classified record type, blank until processed
    pub event_type: String,

    pub email_message_id: Option<EmailMessageId>,

    /// Diagnostic detail, populated on error
    pub note: String,

    #[sqlx(try_from = "String")]
    pub status: WebhookStatus,
}

/// Input for creating a new webhook event
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub body: serde_json::Value,
    pub headers: serde_json::Value,
}
