//! In-memory repositories and blob store.
//!
//! These back the core's unit tests and embedded use without a
//! database; they enforce the same uniqueness invariants as the SQL
//! schema, in particular the provider message id constraint.

use crate::file::FileStorage;
use crate::models::{
    EmailAttachment, EmailMessage, NewEmailAttachment, NewEmailMessage, NewWebhookEvent,
    WebhookEvent,
};
use crate::repository::{
    AttachmentRepository, MessageRepository, SentMessageQuery, WebhookRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use postrider_common::types::{
    AttachmentId, EmailMessageId, MessageStatus, WebhookEventId, WebhookStatus,
};
use postrider_common::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory message repository
#[derive(Default)]
pub struct InMemoryMessageRepository {
    rows: RwLock<HashMap<EmailMessageId, EmailMessage>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, input: NewEmailMessage) -> Result<EmailMessage> {
        let now = Utc::now();
        let message = EmailMessage {
            id: Uuid::new_v4(),
            public_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            sent_at: None,
            created_by: input.created_by,
            sender_name: input.sender_name,
            sender_email: input.sender_email,
            to_name: input.to_name,
            to_email: input.to_email,
            reply_to_name: input.reply_to_name,
            reply_to_email: input.reply_to_email,
            subject: input.subject,
            template_prefix: input.template_prefix,
            template_context: input.template_context,
            message_id: None,
            status: MessageStatus::New,
            error_message: String::new(),
        };

        self.rows.write().await.insert(message.id, message.clone());
        Ok(message)
    }

    async fn get(&self, id: EmailMessageId) -> Result<Option<EmailMessage>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_provider_id(&self, message_id: &str) -> Result<Option<EmailMessage>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|m| m.message_id.as_deref() == Some(message_id))
            .cloned())
    }

    async fn update(&self, message: &EmailMessage) -> Result<()> {
        let mut rows = self.rows.write().await;

        if let Some(provider_id) = &message.message_id {
            let collision = rows
                .values()
                .any(|m| m.id != message.id && m.message_id.as_ref() == Some(provider_id));
            if collision {
                return Err(Error::IntegrityViolation(format!(
                    "Duplicate message_id: {}",
                    provider_id
                )));
            }
        }

        let mut updated = message.clone();
        updated.updated_at = Utc::now();
        rows.insert(updated.id, updated);
        Ok(())
    }

    async fn count_sent_matching(&self, query: &SentMessageQuery) -> Result<i64> {
        let rows = self.rows.read().await;
        let count = rows
            .values()
            .filter(|m| m.sent_at.map_or(false, |at| at > query.sent_after))
            .filter(|m| match &query.created_by {
                Some(actor) => m.created_by == *actor,
                None => true,
            })
            .filter(|m| match &query.template_prefix {
                Some(template_prefix) => &m.template_prefix == template_prefix,
                None => true,
            })
            .filter(|m| match &query.to_email {
                Some(to_email) => &m.to_email == to_email,
                None => true,
            })
            .count();
        Ok(count as i64)
    }
}

/// In-memory attachment repository
#[derive(Default)]
pub struct InMemoryAttachmentRepository {
    rows: RwLock<HashMap<AttachmentId, EmailAttachment>>,
}

impl InMemoryAttachmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttachmentRepository for InMemoryAttachmentRepository {
    async fn create(&self, input: NewEmailAttachment) -> Result<EmailAttachment> {
        let attachment = EmailAttachment {
            id: Uuid::new_v4(),
            email_message_id: input.email_message_id,
            storage_path: input.storage_path,
            filename: input.filename,
            mimetype: input.mimetype,
            position: input.position,
            created_at: Utc::now(),
        };

        self.rows
            .write()
            .await
            .insert(attachment.id, attachment.clone());
        Ok(attachment)
    }

    async fn list_by_message(&self, message_id: EmailMessageId) -> Result<Vec<EmailAttachment>> {
        let mut attachments: Vec<EmailAttachment> = self
            .rows
            .read()
            .await
            .values()
            .filter(|a| a.email_message_id == message_id)
            .cloned()
            .collect();
        attachments.sort_by_key(|a| a.position);
        Ok(attachments)
    }
}

/// In-memory webhook event repository
#[derive(Default)]
pub struct InMemoryWebhookRepository {
    rows: RwLock<HashMap<WebhookEventId, WebhookEvent>>,
}

impl InMemoryWebhookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookRepository for InMemoryWebhookRepository {
    async fn create(&self, input: NewWebhookEvent) -> Result<WebhookEvent> {
        let now = Utc::now();
        let event = WebhookEvent {
            id: Uuid::new_v4(),
            received_at: now,
            created_at: now,
            updated_at: now,
            body: input.body,
            headers: input.headers,
            event_type: String::new(),
            email_message_id: None,
            note: String::new(),
            status: WebhookStatus::New,
        };

        self.rows.write().await.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get(&self, id: WebhookEventId) -> Result<Option<WebhookEvent>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn update(&self, event: &WebhookEvent) -> Result<()> {
        let mut updated = event.clone();
        updated.updated_at = Utc::now();
        self.rows.write().await.insert(updated.id, updated);
        Ok(())
    }

    async fn list_by_message(&self, message_id: EmailMessageId) -> Result<Vec<WebhookEvent>> {
        let mut events: Vec<WebhookEvent> = self
            .rows
            .read()
            .await
            .values()
            .filter(|e| e.email_message_id == Some(message_id))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.received_at);
        Ok(events)
    }
}

/// In-memory blob store
#[derive(Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn store(&self, path: &str, data: &[u8]) -> Result<String> {
        self.blobs
            .write()
            .await
            .insert(path.to_string(), data.to_vec());
        Ok(path.to_string())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("No such blob: {}", path)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::Storage(format!("No such blob: {}", path)))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(path))
    }

    async fn size(&self, path: &str) -> Result<u64> {
        self.blobs
            .read()
            .await
            .get(path)
            .map(|b| b.len() as u64)
            .ok_or_else(|| Error::Storage(format!("No such blob: {}", path)))
    }
}
