//! In-memory bookkeeping shared by the memory and JSONL backends.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use lt_domain::error::{Error, Result};
use lt_domain::message::{title_from_message, ChatMessage, Conversation, Role, DEFAULT_TITLE};
use uuid::Uuid;

/// What an append will do, decided before anything is written.
#[derive(Debug, Clone)]
pub(crate) enum AppendPlan {
    /// Same id already stored.
    Duplicate(ChatMessage),
    Insert {
        message: ChatMessage,
        /// Set when the append implicitly creates its conversation.
        new_conversation: Option<Conversation>,
    },
}

#[derive(Debug, Default)]
pub(crate) struct Ledger {
    /// Per-user logs in append order.
    logs: HashMap<String, Vec<ChatMessage>>,
    conversations: HashMap<Uuid, Conversation>,
}

impl Ledger {
    pub fn with_conversations(conversations: impl IntoIterator<Item = Conversation>) -> Self {
        Self {
            logs: HashMap::new(),
            conversations: conversations.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn has_log(&self, user_id: &str) -> bool {
        self.logs.contains_key(user_id)
    }

    pub fn load_log(&mut self, user_id: &str, messages: Vec<ChatMessage>) {
        self.logs.insert(user_id.to_owned(), messages);
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    pub fn plan_append(&self, mut message: ChatMessage) -> Result<AppendPlan> {
        let log = self.logs.get(&message.user_id);

        if let Some(existing) = log.and_then(|l| l.iter().find(|m| m.id == message.id)) {
            return Ok(AppendPlan::Duplicate(existing.clone()));
        }

        let mut new_conversation = None;
        if let Some(cid) = message.conversation_id {
            match self.conversations.get(&cid) {
                Some(conv) if conv.user_id != message.user_id => {
                    return Err(Error::Store(format!(
                        "conversation {cid} does not belong to the author"
                    )));
                }
                Some(_) => {}
                None => {
                    let title = match message.role {
                        Role::User => title_from_message(&message.content),
                        _ => DEFAULT_TITLE.to_owned(),
                    };
                    new_conversation = Some(Conversation {
                        id: cid,
                        user_id: message.user_id.clone(),
                        title,
                        created_at: message.created_at,
                        updated_at: message.created_at,
                    });
                }
            }
        }

        let previous = log.and_then(|l| {
            l.iter()
                .rev()
                .find(|m| m.conversation_id == message.conversation_id)
                .map(|m| m.created_at)
        });
        message.created_at = next_stamp(previous, message.created_at);

        Ok(AppendPlan::Insert {
            message,
            new_conversation,
        })
    }

    pub fn apply(&mut self, plan: &AppendPlan) {
        if let AppendPlan::Insert {
            message,
            new_conversation,
        } = plan
        {
            if let Some(conv) = new_conversation {
                self.conversations.insert(conv.id, conv.clone());
            }
            self.logs
                .entry(message.user_id.clone())
                .or_default()
                .push(message.clone());
        }
    }

    pub fn insert_conversation(&mut self, conversation: Conversation) {
        self.conversations.insert(conversation.id, conversation);
    }

    pub fn get_conversation(&self, id: Uuid) -> Option<Conversation> {
        self.conversations.get(&id).cloned()
    }

    /// Messages of `user_id`, optionally restricted to one conversation,
    /// oldest first.
    pub fn messages(&self, user_id: &str, conversation_id: Option<Uuid>) -> Vec<ChatMessage> {
        let mut out: Vec<ChatMessage> = self
            .logs
            .get(user_id)
            .map(|log| {
                log.iter()
                    .filter(|m| conversation_id.is_none() || m.conversation_id == conversation_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|m| m.created_at);
        out
    }

    /// Conversations of `user_id`, most recently active first.
    pub fn conversations_of(&self, user_id: &str) -> Vec<Conversation> {
        let log = self.logs.get(user_id);
        let mut out: Vec<Conversation> = self
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| {
                let last = log.and_then(|l| {
                    l.iter()
                        .filter(|m| m.conversation_id == Some(c.id))
                        .map(|m| m.created_at)
                        .max()
                });
                let mut c = c.clone();
                c.updated_at = last.unwrap_or(c.created_at).max(c.created_at);
                c
            })
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.created_at.cmp(&a.created_at)));
        out
    }

    /// Drop a conversation and its messages. Returns `false` when missing
    /// or foreign.
    pub fn remove_conversation(&mut self, user_id: &str, id: Uuid) -> bool {
        match self.conversations.get(&id) {
            Some(c) if c.user_id == user_id => {}
            _ => return false,
        }
        self.conversations.remove(&id);
        if let Some(log) = self.logs.get_mut(user_id) {
            log.retain(|m| m.conversation_id != Some(id));
        }
        true
    }
}

/// Strictly after `previous`, otherwise `proposed`.
pub(crate) fn next_stamp(previous: Option<DateTime<Utc>>, proposed: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if proposed <= prev => prev + Duration::microseconds(1),
        _ => proposed,
    }
}
