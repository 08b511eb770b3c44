use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt messages (provider-agnostic)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged entry of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persisted conversation records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A persisted chat turn half. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// A fresh message stamped with the current time. Stores may bump
    /// `created_at` to keep ordering monotonic within a conversation.
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: Option<Uuid>,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            user_id: user_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Drop the persistence metadata, keeping only what goes into a prompt.
    pub fn to_prompt(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A titled, user-owned sequence of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the latest append; drives "most recent first" listing.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Max chars of the first user message kept as a conversation title.
pub const TITLE_MAX_CHARS: usize = 60;

/// Default title for explicitly created conversations.
pub const DEFAULT_TITLE: &str = "Nueva conversación";

/// Derive a conversation title from its first message.
pub fn title_from_message(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.into();
    }
    match trimmed.char_indices().nth(TITLE_MAX_CHARS) {
        Some((idx, _)) => format!("{}…", trimmed[..idx].trim_end()),
        None => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn short_title_kept_verbatim() {
        assert_eq!(title_from_message("  ¿Qué es el dolo?  "), "¿Qué es el dolo?");
    }

    #[test]
    fn long_title_truncated_on_char_boundary() {
        let text = "á".repeat(100);
        let title = title_from_message(&text);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn blank_title_falls_back() {
        assert_eq!(title_from_message("   "), DEFAULT_TITLE);
    }

    #[test]
    fn chat_message_to_prompt_keeps_role_and_content() {
        let m = ChatMessage::new("u1", None, Role::User, "hola");
        assert_eq!(m.to_prompt(), Message::user("hola"));
    }
}
