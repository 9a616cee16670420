//! Email message repository

use crate::db::DatabasePool;
use crate::models::{EmailMessage, NewEmailMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postrider_common::types::{ActorId, EmailMessageId, MessageStatus};
use postrider_common::{Error, Result};
use uuid::Uuid;

/// Filter for counting recently sent messages during a cooldown check.
///
/// Each `Some` field narrows the count to messages matching the
/// candidate on that dimension; a `None` field ignores the dimension.
#[derive(Debug, Clone)]
pub struct SentMessageQuery {
    /// Only count messages sent strictly after this instant
    pub sent_after: DateTime<Utc>,

    /// Outer `Some` matches on creator, including "no creator" (`None`)
    pub created_by: Option<Option<ActorId>>,

    pub template_prefix: Option<String>,

    pub to_email: Option<String>,
}

/// Email message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Create a new message in status New
    async fn create(&self, input: NewEmailMessage) -> Result<EmailMessage>;

    /// Get a message by primary key
    async fn get(&self, id: EmailMessageId) -> Result<Option<EmailMessage>>;

    /// Find the message carrying a provider-assigned message id
    async fn find_by_provider_id(&self, message_id: &str) -> Result<Option<EmailMessage>>;

    /// Persist all mutable fields of the message.
    ///
    /// A duplicate provider message id fails with
    /// [`Error::IntegrityViolation`].
    async fn update(&self, message: &EmailMessage) -> Result<()>;

    /// Count sent messages matching the query
    async fn count_sent_matching(&self, query: &SentMessageQuery) -> Result<i64>;
}

/// PostgreSQL message repository implementation
pub struct DbMessageRepository {
    pool: DatabasePool,
}

impl DbMessageRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for DbMessageRepository {
    async fn create(&self, input: NewEmailMessage) -> Result<EmailMessage> {
        let id = Uuid::new_v4();
        let public_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query_as::<_, EmailMessage>(
            r#"
            INSERT INTO email_messages (
                id, public_id, created_at, updated_at, sent_at, created_by,
                sender_name, sender_email, to_name, to_email,
                reply_to_name, reply_to_email, subject, template_prefix,
                template_context, message_id, status, error_message
            ) VALUES (
                $1, $2, $3, $4, NULL, $5,
                $6, $7, $8, $9,
                $10, $11, $12, $13,
                $14, NULL, $15, ''
            )
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(public_id)
        .bind(now)
        .bind(now)
        .bind(input.created_by)
        .bind(&input.sender_name)
        .bind(&input.sender_email)
        .bind(&input.to_name)
        .bind(&input.to_email)
        .bind(&input.reply_to_name)
        .bind(&input.reply_to_email)
        .bind(&input.subject)
        .bind(&input.template_prefix)
        .bind(&input.template_context)
        .bind(MessageStatus::New.as_str())
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: EmailMessageId) -> Result<Option<EmailMessage>> {
        sqlx::query_as::<_, EmailMessage>("SELECT * FROM email_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn find_by_provider_id(&self, message_id: &str) -> Result<Option<EmailMessage>> {
        sqlx::query_as::<_, EmailMessage>(
            "SELECT * FROM email_messages WHERE message_id = $1",
        )
        .bind(message_id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(&self, message: &EmailMessage) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE email_messages SET
                updated_at = NOW(),
                sent_at = $2,
                sender_name = $3,
                sender_email = $4,
                to_name = $5,
                to_email = $6,
                reply_to_name = $7,
                reply_to_email = $8,
                subject = $9,
                template_prefix = $10,
                template_context = $11,
                message_id = $12,
                status = $13,
                error_message = $14
            WHERE id = $1
            "#,
        )
        .bind(message.id)
        .bind(message.sent_at)
        .bind(&message.sender_name)
        .bind(&message.sender_email)
        .bind(&message.to_name)
        .bind(&message.to_email)
        .bind(&message.reply_to_name)
        .bind(&message.reply_to_email)
        .bind(&message.subject)
        .bind(&message.template_prefix)
        .bind(&message.template_context)
        .bind(&message.message_id)
        .bind(message.status.as_str())
        .bind(&message.error_message)
        .execute(self.pool.pool())
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn count_sent_matching(&self, query: &SentMessageQuery) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM email_messages WHERE sent_at > $1");
        let mut param_idx = 2;

        match &query.created_by {
            Some(Some(_)) => {
                sql.push_str(&format!(" AND created_by = ${}", param_idx));
                param_idx += 1;
            }
            Some(None) => sql.push_str(" AND created_by IS NULL"),
            None => {}
        }
        if query.template_prefix.is_some() {
            sql.push_str(&format!(" AND template_prefix = ${}", param_idx));
            param_idx += 1;
        }
        if query.to_email.is_some() {
            sql.push_str(&format!(" AND to_email = ${}", param_idx));
        }

        let mut q = sqlx::query_scalar::<_, i64>(&sql).bind(query.sent_after);

        if let Some(Some(actor)) = query.created_by {
            q = q.bind(actor);
        }
        if let Some(template_prefix) = &query.template_prefix {
            q = q.bind(template_prefix);
        }
        if let Some(to_email) = &query.to_email {
            q = q.bind(to_email);
        }

        q.fetch_one(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Map write errors, surfacing unique-constraint breaches distinctly.
///
/// The only uniqueness invariant writable through `update` is the
/// provider message id.
pub(crate) fn map_write_error(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::IntegrityViolation(db.to_string())
        }
        _ => Error::Database(e.to_string()),
    }
}
