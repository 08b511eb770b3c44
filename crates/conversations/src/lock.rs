//! Per-conversation turn serialisation.
//!
//! A turn holds its conversation's permit from the user-message append
//! until the assistant message is persisted, so two turns in the same
//! conversation never interleave. Turns without a conversation id are
//! keyed by user instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

/// Maps each conversation key to a `Semaphore(1)`.
#[derive(Default)]
pub struct ConversationLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ConversationLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock key for a turn: the conversation, or the user when there is none.
    pub fn key(user_id: &str, conversation_id: Option<Uuid>) -> String {
        match conversation_id {
            Some(id) => format!("conv:{id}"),
            None => format!("user:{user_id}"),
        }
    }

    /// Wait for the permit, giving up after `timeout`. The permit releases
    /// on drop.
    pub async fn acquire(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<OwnedSemaphorePermit, ConversationBusy> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };

        if let Ok(permit) = sem.clone().try_acquire_owned() {
            return Ok(permit);
        }
        tracing::debug!(key, "waiting for in-flight turn");

        match tokio::time::timeout(timeout, sem.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            _ => Err(ConversationBusy),
        }
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget keys nobody holds.
    pub fn prune_idle(&self) {
        self.locks.lock().retain(|_, sem| sem.available_permits() == 0);
    }
}

/// Another turn kept the conversation locked for the whole wait.
#[derive(Debug)]
pub struct ConversationBusy;

impl std::fmt::Display for ConversationBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conversation is busy: another turn is still running")
    }
}

impl std::error::Error for ConversationBusy {}
