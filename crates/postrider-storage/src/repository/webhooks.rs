//! Webhook event repository

use crate::db::DatabasePool;
use crate::models::{NewWebhookEvent, WebhookEvent};
use async_trait::async_trait;
use postrider_common::types::{EmailMessageId, WebhookEventId, WebhookStatus};
use postrider_common::{Error, Result};
use uuid::Uuid;

/// Webhook event repository trait
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Create a new webhook event in status New
    async fn create(&self, input: NewWebhookEvent) -> Result<WebhookEvent>;

    /// Get a webhook event by primary key
    async fn get(&self, id: WebhookEventId) -> Result<Option<WebhookEvent>>;

    /// Persist all mutable fields of the event
    async fn update(&self, event: &WebhookEvent) -> Result<()>;

    /// List events linked to a message
    async fn list_by_message(&self, message_id: EmailMessageId) -> Result<Vec<WebhookEvent>>;
}

/// PostgreSQL webhook event repository implementation
pub struct DbWebhookRepository {
    pool: DatabasePool,
}

impl DbWebhookRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookRepository for DbWebhookRepository {
    async fn create(&self, input: NewWebhookEvent) -> Result<WebhookEvent> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, WebhookEvent>(
            r#"
            INSERT INTO webhook_events (
                id, received_at, created_at, updated_at, body, headers,
                event_type, email_message_id, note, status
            ) VALUES ($1, NOW(), NOW(), NOW(), $2, $3, '', NULL, '', $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.body)
        .bind(&input.headers)
        .bind(WebhookStatus::New.as_str())
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: WebhookEventId) -> Result<Option<WebhookEvent>> {
        sqlx::query_as::<_, WebhookEvent>("SELECT * FROM webhook_events WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(&self, event: &WebhookEvent) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events SET
                updated_at = NOW(),
                event_type = $2,
                email_message_id = $3,
                note = $4,
                status = $5
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(&event.event_type)
        .bind(event.email_message_id)
        .bind(&event.note)
        .bind(event.status.as_str())
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    async fn list_by_message(&self, message_id: EmailMessageId) -> Result<Vec<WebhookEvent>> {
        sqlx::query_as::<_, WebhookEvent>(
            r#"
            SELECT * FROM webhook_events
            WHERE email_message_id = $1
            ORDER BY received_at ASC
            "#,
        )
        .bind(message_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
