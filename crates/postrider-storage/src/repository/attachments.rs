//! Email attachment repository

use crate::db::DatabasePool;
use crate::models::{EmailAttachment, NewEmailAttachment};
use async_trait::async_trait;
use postrider_common::types::EmailMessageId;
use postrider_common::{Error, Result};
use uuid::Uuid;

/// Email attachment repository trait
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Create a new attachment record
    async fn create(&self, input: NewEmailAttachment) -> Result<EmailAttachment>;

    /// List attachments for a message in sibling order
    async fn list_by_message(&self, message_id: EmailMessageId) -> Result<Vec<EmailAttachment>>;
}

/// PostgreSQL attachment repository implementation
pub struct DbAttachmentRepository {
    pool: DatabasePool,
}

impl DbAttachmentRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttachmentRepository for DbAttachmentRepository {
    async fn create(&self, input: NewEmailAttachment) -> Result<EmailAttachment> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, EmailAttachment>(
            r#"
            INSERT INTO email_attachments (
                id, email_message_id, storage_path, filename, mimetype, position, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.email_message_id)
        .bind(&input.storage_path)
        .bind(&input.filename)
        .bind(&input.mimetype)
        .bind(input.position)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_message(&self, message_id: EmailMessageId) -> Result<Vec<EmailAttachment>> {
        sqlx::query_as::<_, EmailAttachment>(
            r#"
            SELECT * FROM email_attachments
            WHERE email_message_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(message_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
