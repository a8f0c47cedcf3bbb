use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_enum;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

string_enum!(Role {
    User => "user",
    Assistant => "assistant",
    System => "system",
});

/// A persisted chat turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Agent that produced an assistant turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
}

/// Fields supplied when appending a chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub role: Role,
    pub content: String,
    pub agent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NewChatMessage {
    /// A user turn stamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            agent_id: None,
            timestamp: Utc::now(),
        }
    }

    /// An assistant turn from `agent_id` stamped now.
    pub fn assistant(agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            agent_id: Some(agent_id.into()),
            timestamp: Utc::now(),
        }
    }
}
