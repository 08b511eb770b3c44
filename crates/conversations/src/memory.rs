//! Process-local store. Nothing survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use lt_domain::error::Result;
use lt_domain::message::{ChatMessage, Conversation, DEFAULT_TITLE};
use lt_domain::trace::TraceEvent;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::ledger::{AppendPlan, Ledger};
use crate::store::ConversationStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage> {
        // Plan and apply under one write lock so concurrent appends to the
        // same conversation cannot interleave their stamps.
        let mut ledger = self.ledger.write();
        let plan = ledger.plan_append(message)?;
        ledger.apply(&plan);
        drop(ledger);

        match plan {
            AppendPlan::Duplicate(existing) => Ok(existing),
            AppendPlan::Insert { message, .. } => {
                TraceEvent::MessageAppended {
                    conversation_id: message.conversation_id.map(|c| c.to_string()),
                    role: message.role.as_str().into(),
                    chars: message.content.chars().count(),
                }
                .emit();
                Ok(message)
            }
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self.ledger.read().messages(user_id, None))
    }

    async fn list_by_conversation(
        &self,
        user_id: &str,
        conversation_id: Uuid,
    ) -> Result<Vec<ChatMessage>> {
        Ok(self.ledger.read().messages(user_id, Some(conversation_id)))
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<String>,
    ) -> Result<Conversation> {
        let now = Utc::now();
        let conv = Conversation {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            created_at: now,
            updated_at: now,
        };
        self.ledger.write().insert_conversation(conv.clone());
        Ok(conv)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.ledger.read().get_conversation(id))
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        Ok(self.ledger.read().conversations_of(user_id))
    }

    async fn delete_conversation(&self, user_id: &str, id: Uuid) -> Result<bool> {
        Ok(self.ledger.write().remove_conversation(user_id, id))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
