//! Postrider Core - message lifecycle engine
//!
//! Drives outbound email through its full lifecycle: preparation from
//! templates, attachment binding, cooldown-gated dispatch over SMTP,
//! and reconciliation of provider webhook events back onto messages.

pub mod cooldown;
pub mod dispatch;
pub mod lock;
pub mod render;
pub mod text;
pub mod transport;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testutil;

pub use cooldown::{CooldownPolicy, CooldownScope};
pub use dispatch::EmailDispatcher;
pub use lock::EntityLocks;
pub use render::{MiniJinjaRenderer, TemplateRenderer};
pub use transport::{
    format_mailbox, MailTransport, OutboundAttachment, OutboundEmail, SmtpMailTransport,
    SmtpTransportConfig,
};
pub use webhook::WebhookProcessor;
