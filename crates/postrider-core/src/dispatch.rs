//! Email dispatch
//!
//! [`EmailDispatcher`] drives a message through its lifecycle:
//! created as `new`, prepared into `ready`, then sent through
//! `pending` into `sent` or `error`. Preparation normalizes addresses,
//! resolves the subject, and folds branding into the template context;
//! sending renders the bodies, binds attachments, and hands the result
//! to the transport.

use crate::cooldown::{self, CooldownPolicy};
use crate::lock::EntityLocks;
use crate::render::TemplateRenderer;
use crate::text::{trim_string, truncate_with_ellipsis};
use crate::transport::{format_mailbox, MailTransport, OutboundAttachment, OutboundEmail};
use chrono::Utc;
use postrider_common::config::DispatchConfig;
use postrider_common::types::{EmailMessageId, MessageStatus};
use postrider_common::{Error, Result};
use postrider_storage::file::FileStorage;
use postrider_storage::models::{
    EmailAttachment, EmailMessage, NewEmailAttachment, NewEmailMessage,
};
use postrider_storage::repository::{AttachmentRepository, MessageRepository};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Storage key prefix for attachment blobs
const ATTACHMENT_KEY_PREFIX: &str = "email_attachments";

/// Orchestrates the outbound message lifecycle.
///
/// Transitions on one message are serialized through [`EntityLocks`]:
/// each operation takes the message's lock, reloads the row, and only
/// then checks its status precondition.
pub struct EmailDispatcher {
    messages: Arc<dyn MessageRepository>,
    attachments: Arc<dyn AttachmentRepository>,
    blobs: Arc<dyn FileStorage>,
    renderer: Arc<dyn TemplateRenderer>,
    transport: Arc<dyn MailTransport>,
    locks: Arc<EntityLocks>,
    config: DispatchConfig,
}

impl EmailDispatcher {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        attachments: Arc<dyn AttachmentRepository>,
        blobs: Arc<dyn FileStorage>,
        renderer: Arc<dyn TemplateRenderer>,
        transport: Arc<dyn MailTransport>,
        locks: Arc<EntityLocks>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            messages,
            attachments,
            blobs,
            renderer,
            transport,
            locks,
            config,
        }
    }

    /// Reload a message row, failing when it no longer exists.
    async fn fetch(&self, id: EmailMessageId) -> Result<EmailMessage> {
        self.messages
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Email message {}", id)))
    }

    /// Create a new message record in status `new`.
    pub async fn create(&self, input: NewEmailMessage) -> Result<EmailMessage> {
        let message = self.messages.create(input).await?;
        debug!(message_id = %message.id, template_prefix = %message.template_prefix, "Created email message");
        Ok(message)
    }

    /// Prepare a `new` message for sending.
    ///
    /// Normalizes address fields (falling back to the configured
    /// defaults for the sender), resolves and truncates the subject,
    /// and merges branding into the template context. On success the
    /// message is `ready`. A reply-to name without an address moves
    /// the message to `error`.
    pub async fn prepare(&self, message: &mut EmailMessage) -> Result<()> {
        let _guard = self.locks.acquire(message.id).await;
        *message = self.fetch(message.id).await?;

        if message.status != MessageStatus::New {
            return Err(Error::InvalidStateTransition(format!(
                "Cannot prepare message {} in status {}",
                message.id, message.status
            )));
        }

        message.sender_email =
            trim_string(non_empty_or(&message.sender_email, &self.config.default_from_email));
        message.sender_name =
            trim_string(non_empty_or(&message.sender_name, &self.config.default_from_name));
        message.to_name = trim_string(&message.to_name);
        message.to_email = trim_string(&message.to_email);
        message.reply_to_name = trim_string(&message.reply_to_name);
        message.reply_to_email = trim_string(&message.reply_to_email);
        self.messages.update(message).await?;

        if !message.reply_to_name.is_empty() && message.reply_to_email.is_empty() {
            let reason = format!(
                "Message {} has a reply-to name but no reply-to email",
                message.id
            );
            message.status = MessageStatus::Error;
            message.error_message = reason.clone();
            self.messages.update(message).await?;
            error!(message_id = %message.id, "Reply-to name without reply-to email");
            return Err(Error::Validation(reason));
        }

        let mut context = self.config.branding_context();
        if let Some(own) = message.template_context.as_object() {
            for (key, value) in own {
                context.insert(key.clone(), value.clone());
            }
        }

        let mut subject = message.subject.clone();
        if subject.is_empty() {
            subject = self.renderer.render(
                &format!("{}_subject.txt", message.template_prefix),
                &serde_json::Value::Object(context.clone()),
            )?;
        }
        subject = trim_string(&subject);
        if subject.chars().count() > self.config.max_subject_length {
            subject = truncate_with_ellipsis(&subject, self.config.max_subject_length);
        }
        context.insert("subject".to_string(), subject.clone().into());

        message.subject = subject;
        message.template_context = serde_json::Value::Object(context);
        message.status = MessageStatus::Ready;
        self.messages.update(message).await?;

        debug!(message_id = %message.id, "Prepared email message");
        Ok(())
    }

    /// Bind attachment content to a `ready` message.
    ///
    /// The declared mimetype must match what the filename extension
    /// implies. Content is stored under a generated key and the record
    /// takes the next position for the message.
    pub async fn attach(
        &self,
        message: &EmailMessage,
        content: &[u8],
        filename: &str,
        mimetype: &str,
    ) -> Result<EmailAttachment> {
        let _guard = self.locks.acquire(message.id).await;
        let stored = self.fetch(message.id).await?;

        if stored.status != MessageStatus::Ready {
            return Err(Error::InvalidStateTransition(format!(
                "Cannot attach to message {} in status {}; prepare it first",
                message.id, stored.status
            )));
        }

        let inferred = mime_guess::from_path(filename).first_raw();
        if inferred != Some(mimetype) {
            return Err(Error::Validation(format!(
                "Filename {:?} does not look like a {:?} file",
                filename, mimetype
            )));
        }

        let extension = extension_for_mime(mimetype).ok_or_else(|| {
            Error::Validation(format!("No known file extension for mimetype {:?}", mimetype))
        })?;
        let key = format!("{}/{}.{}", ATTACHMENT_KEY_PREFIX, Uuid::new_v4(), extension);
        let storage_path = self.blobs.store(&key, content).await?;

        let position = self.attachments.list_by_message(message.id).await?.len() as i32;
        let attachment = self
            .attachments
            .create(NewEmailAttachment {
                email_message_id: message.id,
                storage_path,
                filename: filename.to_string(),
                mimetype: mimetype.to_string(),
                position,
            })
            .await?;

        debug!(message_id = %message.id, filename = %filename, position, "Bound attachment");
        Ok(attachment)
    }

    /// Prepare if needed, check the cooldown, and send.
    ///
    /// Returns `Ok(true)` when the message was sent and `Ok(false)`
    /// when the cooldown suppressed it, leaving it `canceled`. Send
    /// failures propagate after the message is marked accordingly.
    pub async fn queue(
        &self,
        message: &mut EmailMessage,
        policy: &CooldownPolicy,
    ) -> Result<bool> {
        if message.status != MessageStatus::Ready {
            self.prepare(message).await?;
        }

        {
            let _guard = self.locks.acquire(message.id).await;
            *message = self.fetch(message.id).await?;

            if message.status == MessageStatus::Ready
                && cooldown::is_cooling_down(self.messages.as_ref(), message, policy).await?
            {
                message.status = MessageStatus::Canceled;
                message.error_message = "Cooling down".to_string();
                self.messages.update(message).await?;
                info!(message_id = %message.id, to = %message.to_email, "Send suppressed by cooldown");
                return Ok(false);
            }
        }

        self.send(message).await?;
        Ok(true)
    }

    /// Send a `ready` message through the transport.
    ///
    /// The message passes through `pending` while in flight. On
    /// success it becomes `sent` with `sent_at` and, when the
    /// transport returned exactly one provider id, `message_id` set.
    /// On failure it becomes `error` with the failure recorded, and
    /// the error is returned.
    pub async fn send(&self, message: &mut EmailMessage) -> Result<()> {
        let _guard = self.locks.acquire(message.id).await;
        *message = self.fetch(message.id).await?;

        if message.status != MessageStatus::Ready {
            return Err(Error::InvalidStateTransition(format!(
                "Cannot send message {} in status {}; prepare or queue it first",
                message.id, message.status
            )));
        }

        message.status = MessageStatus::Pending;
        self.messages.update(message).await?;

        match self.deliver(message).await {
            Ok(provider_ids) => {
                if let [provider_id] = provider_ids.as_slice() {
                    message.message_id = Some(provider_id.clone());
                } else {
                    warn!(
                        message_id = %message.id,
                        count = provider_ids.len(),
                        "Expected exactly one provider id"
                    );
                }
                message.status = MessageStatus::Sent;
                message.sent_at = Some(Utc::now());
                self.messages.update(message).await?;
                info!(message_id = %message.id, to = %message.to_email, "Email sent");
                Ok(())
            }
            Err(e) => {
                message.status = MessageStatus::Error;
                message.error_message = e.to_string();
                self.messages.update(message).await?;
                error!(message_id = %message.id, error = %e, "Email send failed");
                Err(e)
            }
        }
    }

    /// Copy a message into a fresh, prepared record.
    ///
    /// Delivery state (`sent_at`, `message_id`, `error_message`, the
    /// status) is not carried over. Attachment content is re-stored
    /// under new keys, preserving order.
    pub async fn duplicate(&self, original: &EmailMessage) -> Result<EmailMessage> {
        let mut duplicate = self
            .messages
            .create(NewEmailMessage {
                created_by: original.created_by,
                sender_name: original.sender_name.clone(),
                sender_email: original.sender_email.clone(),
                to_name: original.to_name.clone(),
                to_email: original.to_email.clone(),
                reply_to_name: original.reply_to_name.clone(),
                reply_to_email: original.reply_to_email.clone(),
                subject: original.subject.clone(),
                template_prefix: original.template_prefix.clone(),
                template_context: original.template_context.clone(),
            })
            .await?;

        self.prepare(&mut duplicate).await?;

        for attachment in self.attachments.list_by_message(original.id).await? {
            let content = self.blobs.read(&attachment.storage_path).await?;
            self.attach(&duplicate, &content, &attachment.filename, &attachment.mimetype)
                .await?;
        }

        info!(original_id = %original.id, duplicate_id = %duplicate.id, "Duplicated email message");
        Ok(duplicate)
    }

    /// Render bodies, load attachments, and hand off to the transport.
    async fn deliver(&self, message: &EmailMessage) -> Result<Vec<String>> {
        let text_body = self.renderer.render(
            &format!("{}_message.txt", message.template_prefix),
            &message.template_context,
        )?;

        // The HTML body is optional; everything else renders text-only.
        let html_body = match self.renderer.render(
            &format!("{}_message.html", message.template_prefix),
            &message.template_context,
        ) {
            Ok(html) => Some(html),
            Err(Error::TemplateNotFound(name)) => {
                warn!(message_id = %message.id, template = %name, "No HTML template, sending text only");
                None
            }
            Err(e) => return Err(e),
        };

        let reply_to = if message.reply_to_email.is_empty() {
            None
        } else {
            Some(format_mailbox(&message.reply_to_name, &message.reply_to_email))
        };

        let mut outbound_attachments = Vec::new();
        for attachment in self.attachments.list_by_message(message.id).await? {
            let content = self.blobs.read(&attachment.storage_path).await?;
            outbound_attachments.push(OutboundAttachment {
                filename: attachment.filename,
                mimetype: attachment.mimetype,
                content,
            });
        }

        let email = OutboundEmail {
            from: format_mailbox(&message.sender_name, &message.sender_email),
            to: format_mailbox(&message.to_name, &message.to_email),
            reply_to,
            subject: message.subject.clone(),
            text_body,
            html_body,
            attachments: outbound_attachments,
        };

        self.transport.send(&email).await
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn extension_for_mime(mimetype: &str) -> Option<&'static str> {
    mime_guess::get_mime_extensions_str(mimetype).and_then(|extensions| extensions.first().copied())
}
