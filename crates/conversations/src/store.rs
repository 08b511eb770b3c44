use async_trait::async_trait;
use lt_domain::error::Result;
use lt_domain::message::{ChatMessage, Conversation};
use uuid::Uuid;

/// Persistence for chat turns.
///
/// Guarantees every backend upholds:
///
/// * `append` is idempotent by message id: re-appending an acknowledged id
///   returns the stored message and writes nothing.
/// * Within one conversation `created_at` strictly increases in append
///   order; a stamp that does not advance is bumped by one microsecond.
/// * Appending to an unknown `conversation_id` creates that conversation
///   for the author, titled from the message.
/// * Appending to a conversation owned by someone else fails.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persist one message. Returns it as stored.
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage>;

    /// Every message of `user_id`, oldest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ChatMessage>>;

    /// Messages of one conversation owned by `user_id`, oldest first.
    async fn list_by_conversation(
        &self,
        user_id: &str,
        conversation_id: Uuid,
    ) -> Result<Vec<ChatMessage>>;

    async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<String>,
    ) -> Result<Conversation>;

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>>;

    /// Conversations of `user_id`, most recently active first.
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// Remove a conversation and its messages. `false` when it does not
    /// exist or belongs to another user.
    async fn delete_conversation(&self, user_id: &str, id: Uuid) -> Result<bool>;

    fn backend_name(&self) -> &'static str;
}
