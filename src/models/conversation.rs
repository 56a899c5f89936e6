use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of a conversation. `0` never names a stored conversation and is
/// used by callers to ask for a new one.
pub type ConversationId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Bumped on every message write; drives most-recent-first listing.
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}
