//! Provider webhook ingest and reconciliation
//!
//! Delivery providers report message fate (delivered, opened,
//! bounced, marked as spam) through webhooks that can arrive in any
//! order. Each event is persisted first and then reconciled onto its
//! message: the message takes the status of the event carrying the
//! latest provider timestamp, so a late-arriving older event never
//! regresses it.

use crate::lock::EntityLocks;
use chrono::{DateTime, Utc};
use postrider_common::types::{MessageStatus, WebhookStatus};
use postrider_common::{Error, Result};
use postrider_storage::models::{NewWebhookEvent, WebhookEvent};
use postrider_storage::repository::{MessageRepository, WebhookRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Message status implied by a provider record type
fn status_for_record_type(record_type: &str) -> Option<MessageStatus> {
    match record_type {
        "Delivery" => Some(MessageStatus::Delivered),
        "Open" => Some(MessageStatus::Opened),
        "Bounce" => Some(MessageStatus::Bounced),
        "SpamComplaint" => Some(MessageStatus::Spam),
        _ => None,
    }
}

/// Payload field carrying the provider timestamp for a record type
fn timestamp_field(record_type: &str) -> Option<&'static str> {
    match record_type {
        "Delivery" => Some("DeliveredAt"),
        "Open" => Some("ReceivedAt"),
        "Bounce" | "SpamComplaint" => Some("BouncedAt"),
        _ => None,
    }
}

/// Extract the provider timestamp from an event's payload.
fn event_timestamp(event: &WebhookEvent) -> Result<DateTime<Utc>> {
    let field = timestamp_field(&event.event_type).ok_or_else(|| {
        Error::Validation(format!(
            "No timestamp field known for record type {:?}",
            event.event_type
        ))
    })?;

    let raw = event
        .body
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            Error::Validation(format!("Webhook event {} has no {} field", event.id, field))
        })?;

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("Bad timestamp {:?}: {}", raw, e)))
}

/// Accepts provider webhooks and reconciles them onto messages.
///
/// Event transitions are serialized per event, and reconciliation is
/// serialized per message, through [`EntityLocks`] shared with the
/// dispatcher.
#[derive(Clone)]
pub struct WebhookProcessor {
    messages: Arc<dyn MessageRepository>,
    webhooks: Arc<dyn WebhookRepository>,
    locks: Arc<EntityLocks>,
}

impl WebhookProcessor {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        webhooks: Arc<dyn WebhookRepository>,
        locks: Arc<EntityLocks>,
    ) -> Self {
        Self {
            messages,
            webhooks,
            locks,
        }
    }

    /// Persist an incoming webhook in status `new`.
    ///
    /// The body must be a JSON object; nothing is stored otherwise.
    /// Only string-valued headers are kept.
    pub async fn ingest(
        &self,
        body: &str,
        headers: &HashMap<String, serde_json::Value>,
    ) -> Result<WebhookEvent> {
        let payload: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| Error::Validation(format!("Webhook body is not valid JSON: {}", e)))?;
        if !payload.is_object() {
            return Err(Error::Validation(
                "Webhook body is not a JSON object".to_string(),
            ));
        }

        let mut header_map = serde_json::Map::new();
        for (key, value) in headers {
            if value.is_string() {
                header_map.insert(key.clone(), value.clone());
            }
        }

        let event = self
            .webhooks
            .create(NewWebhookEvent {
                body: payload,
                headers: serde_json::Value::Object(header_map),
            })
            .await?;

        info!(event_id = %event.id, "Webhook event received");
        Ok(event)
    }

    /// Process a `new` webhook event.
    ///
    /// Reconciliation failures are absorbed: the event moves to
    /// `error` with the failure recorded in its note, and `Ok` is
    /// returned. Calling this on an event that is not `new` is a
    /// caller bug and fails without touching anything.
    pub async fn process(&self, event: &mut WebhookEvent) -> Result<()> {
        let _guard = self.locks.acquire(event.id).await;
        *event = self
            .webhooks
            .get(event.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Webhook event {}", event.id)))?;

        if event.status != WebhookStatus::New {
            return Err(Error::InvalidStateTransition(format!(
                "Cannot process webhook event {} in status {}",
                event.id, event.status
            )));
        }

        match self.reconcile(event).await {
            Ok(()) => {
                event.status = WebhookStatus::Processed;
                self.webhooks.update(event).await?;
                debug!(event_id = %event.id, event_type = %event.event_type, "Webhook event processed");
                Ok(())
            }
            Err(e) => {
                event.status = WebhookStatus::Error;
                event.note = format!("{:?}", e);
                self.webhooks.update(event).await?;
                error!(event_id = %event.id, error = %e, "Webhook event moved to error");
                Ok(())
            }
        }
    }

    /// Link the event to its message and advance the message status.
    ///
    /// The message only changes when this event's provider timestamp
    /// is strictly later than every other event already linked to the
    /// message; equal or older timestamps leave it alone.
    async fn reconcile(&self, event: &mut WebhookEvent) -> Result<()> {
        event.status = WebhookStatus::Pending;
        self.webhooks.update(event).await?;

        if let Some(record_type) = event.body.get("RecordType").and_then(|v| v.as_str()) {
            event.event_type = record_type.to_string();
            self.webhooks.update(event).await?;
        }

        let provider_id = match event.body.get("MessageID").and_then(|v| v.as_str()) {
            Some(provider_id) => provider_id,
            None => return Ok(()),
        };

        let found = match self.messages.find_by_provider_id(provider_id).await? {
            Some(message) => message,
            None => {
                debug!(event_id = %event.id, provider_id, "No message for webhook event");
                return Ok(());
            }
        };

        // Reconciliation for one message runs exclusively, and the
        // link is persisted before the scan, so a concurrent event for
        // the same message sees this one among the priors.
        let _guard = self.locks.acquire(found.id).await;
        let mut message = match self.messages.get(found.id).await? {
            Some(message) => message,
            None => return Ok(()),
        };

        event.email_message_id = Some(message.id);
        self.webhooks.update(event).await?;

        let new_status = match status_for_record_type(&event.event_type) {
            Some(new_status) => new_status,
            None => return Ok(()),
        };

        let timestamp = event_timestamp(event)?;

        let mut latest_prior: Option<DateTime<Utc>> = None;
        for other in self.webhooks.list_by_message(message.id).await? {
            if other.id == event.id {
                continue;
            }
            let other_timestamp = event_timestamp(&other)?;
            if latest_prior.map_or(true, |prior| other_timestamp > prior) {
                latest_prior = Some(other_timestamp);
            }
        }

        if latest_prior.map_or(true, |prior| timestamp > prior) {
            message.status = new_status;
            self.messages.update(&message).await?;
            info!(
                event_id = %event.id,
                message_id = %message.id,
                status = %new_status,
                "Message status reconciled from webhook"
            );
        }

        Ok(())
    }
}
