//! Chat sessions and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A named conversation with a set of attached documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: usize,
}

impl ChatSession {
    pub fn new(id: String, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            document_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            message_count: 0,
        }
    }
}

/// One message within a session. Messages are ordered by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    /// Graph payload embedded in assistant answers for visualization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        id: String,
        session_id: impl Into<String>,
        role: ChatRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            session_id: session_id.into(),
            role,
            content: content.into(),
            graph_data: None,
            created_at: Utc::now(),
        }
    }
}
