//! Repository layer for data access

pub mod attachments;
pub mod messages;
pub mod webhooks;

// Re-export repository traits
pub use attachments::AttachmentRepository;
pub use messages::{MessageRepository, SentMessageQuery};
pub use webhooks::WebhookRepository;

// Re-export concrete implementations
pub use attachments::DbAttachmentRepository;
pub use messages::DbMessageRepository;
pub use webhooks::DbWebhookRepository;
