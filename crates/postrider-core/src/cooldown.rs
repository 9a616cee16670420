//! Send cooldown
//!
//! Guards against duplicate sends by counting recently sent messages
//! that match the candidate on a configurable set of scope fields.

use chrono::{Duration, Utc};
use postrider_common::Result;
use postrider_storage::models::EmailMessage;
use postrider_storage::repository::{MessageRepository, SentMessageQuery};

/// A field the cooldown check matches on.
///
/// Every selected scope narrows the set of prior sends that count
/// against the limit, so fewer scopes means more aggressive
/// suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownScope {
    CreatedBy,
    TemplatePrefix,
    To,
}

/// Cooldown window, limit, and matching scopes
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    /// Lookback window in seconds
    pub period_secs: i64,
    /// Sends allowed within the window before suppression kicks in
    pub allowed: i64,
    pub scopes: Vec<CooldownScope>,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            period_secs: 180,
            allowed: 1,
            scopes: vec![
                CooldownScope::CreatedBy,
                CooldownScope::TemplatePrefix,
                CooldownScope::To,
            ],
        }
    }
}

/// Check whether `message` is inside its cooldown window.
///
/// Counts messages sent within the window that match `message` on all
/// scopes in the policy. Returns true once the count reaches the
/// allowed limit.
pub async fn is_cooling_down(
    repo: &dyn MessageRepository,
    message: &EmailMessage,
    policy: &CooldownPolicy,
) -> Result<bool> {
    let query = SentMessageQuery {
        sent_after: Utc::now() - Duration::seconds(policy.period_secs),
        created_by: policy
            .scopes
            .contains(&CooldownScope::CreatedBy)
            .then_some(message.created_by),
        template_prefix: policy
            .scopes
            .contains(&CooldownScope::TemplatePrefix)
            .then(|| message.template_prefix.clone()),
        to_email: policy
            .scopes
            .contains(&CooldownScope::To)
            .then(|| message.to_email.clone()),
    };

    let sent_count = repo.count_sent_matching(&query).await?;
    Ok(sent_count >= policy.allowed)
}
