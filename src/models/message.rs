use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversation::ConversationId;

pub type MessageId = i64;

/// Author of a message.
///
/// Roles outside the known three are kept verbatim in `Other` so that rows
/// written by other tools still load; they never reach the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::parse(&s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_unknown_names() {
        assert_eq!(Role::parse("user"), Role::User);
        assert_eq!(Role::parse("tool"), Role::Other("tool".to_string()));
        assert_eq!(Role::parse("tool").as_str(), "tool");
    }

    #[test]
    fn test_role_serializes_as_plain_string() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: Role = serde_json::from_str("\"function\"").unwrap();
        assert_eq!(role, Role::Other("function".to_string()));
    }
}
