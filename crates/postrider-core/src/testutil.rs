//! Shared test fixtures: a static template set, a recording
//! transport, and a dispatcher wired to in-memory storage.

use crate::dispatch::EmailDispatcher;
use crate::lock::EntityLocks;
use crate::render::TemplateRenderer;
use crate::transport::{MailTransport, OutboundEmail};
use crate::webhook::WebhookProcessor;
use async_trait::async_trait;
use postrider_common::config::{BrandingConfig, DispatchConfig};
use postrider_common::{Error, Result};
use postrider_storage::file::FileStorage;
use postrider_storage::memory::{
    InMemoryAttachmentRepository, InMemoryMessageRepository, InMemoryWebhookRepository,
    MemoryStorage,
};
use postrider_storage::models::{EmailMessage, NewEmailMessage};
use postrider_storage::repository::{
    AttachmentRepository, MessageRepository, WebhookRepository,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Renders from a fixed name-to-body map.
pub(crate) struct StaticRenderer {
    templates: HashMap<String, String>,
}

impl StaticRenderer {
    pub(crate) fn with_defaults() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            "core/email/password_reset_subject.txt".to_string(),
            "Reset your password".to_string(),
        );
        templates.insert(
            "core/email/password_reset_message.txt".to_string(),
            "Hello, reset your password here.".to_string(),
        );
        templates.insert(
            "core/email/password_reset_message.html".to_string(),
            "<p>Hello, reset your password here.</p>".to_string(),
        );
        templates.insert(
            "core/email/plain_message.txt".to_string(),
            "Plain text only.".to_string(),
        );
        Self { templates }
    }
}

impl TemplateRenderer for StaticRenderer {
    fn render(&self, name: &str, _context: &serde_json::Value) -> Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }
}

/// Records every send instead of talking to a relay.
pub(crate) struct RecordingTransport {
    outbox: Mutex<Vec<OutboundEmail>>,
    fixed_ids: Mutex<Option<Vec<String>>>,
    failure: Mutex<Option<String>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            fixed_ids: Mutex::new(None),
            failure: Mutex::new(None),
        }
    }

    /// Sends made so far
    pub(crate) fn outbox(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().unwrap().clone()
    }

    /// Make every send return these provider ids
    pub(crate) fn return_ids(&self, ids: Vec<String>) {
        *self.fixed_ids.lock().unwrap() = Some(ids);
    }

    /// Make every send fail with this message
    pub(crate) fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<Vec<String>> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(Error::Transport(message));
        }

        self.outbox.lock().unwrap().push(email.clone());

        let ids = self
            .fixed_ids
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| vec![format!("pm-{}", Uuid::new_v4())]);
        Ok(ids)
    }
}

/// A dispatcher and webhook processor over in-memory storage.
pub(crate) struct TestHarness {
    pub(crate) dispatcher: EmailDispatcher,
    pub(crate) processor: WebhookProcessor,
    pub(crate) messages: Arc<InMemoryMessageRepository>,
    pub(crate) attachments: Arc<InMemoryAttachmentRepository>,
    pub(crate) webhooks: Arc<InMemoryWebhookRepository>,
    pub(crate) blobs: Arc<MemoryStorage>,
    pub(crate) transport: Arc<RecordingTransport>,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        let messages = Arc::new(InMemoryMessageRepository::new());
        let attachments = Arc::new(InMemoryAttachmentRepository::new());
        let webhooks = Arc::new(InMemoryWebhookRepository::new());
        let blobs = Arc::new(MemoryStorage::new());
        let transport = Arc::new(RecordingTransport::new());
        let locks = Arc::new(EntityLocks::new());

        let config = DispatchConfig {
            default_from_email: "noreply@example.com".to_string(),
            default_from_name: "Example".to_string(),
            max_subject_length: 78,
            branding: BrandingConfig {
                contact_email: "help@example.com".to_string(),
                site_name: "Example".to_string(),
                company: "Example Inc".to_string(),
                ..Default::default()
            },
        };

        let dispatcher = EmailDispatcher::new(
            messages.clone() as Arc<dyn MessageRepository>,
            attachments.clone() as Arc<dyn AttachmentRepository>,
            blobs.clone() as Arc<dyn FileStorage>,
            Arc::new(StaticRenderer::with_defaults()),
            transport.clone() as Arc<dyn MailTransport>,
            locks.clone(),
            config,
        );

        let processor = WebhookProcessor::new(
            messages.clone() as Arc<dyn MessageRepository>,
            webhooks.clone() as Arc<dyn WebhookRepository>,
            locks,
        );

        Self {
            dispatcher,
            processor,
            messages,
            attachments,
            webhooks,
            blobs,
            transport,
        }
    }

    pub(crate) async fn create(&self, input: NewEmailMessage) -> EmailMessage {
        self.dispatcher.create(input).await.unwrap()
    }

    /// Reload a message from storage
    pub(crate) async fn stored(&self, message: &EmailMessage) -> EmailMessage {
        self.messages.get(message.id).await.unwrap().unwrap()
    }
}

/// A minimal valid message input
pub(crate) fn new_message() -> NewEmailMessage {
    NewEmailMessage {
        to_name: "Bob".to_string(),
        to_email: "bob@example.com".to_string(),
        subject: "A subject".to_string(),
        template_prefix: "core/email/password_reset".to_string(),
        ..Default::default()
    }
}
