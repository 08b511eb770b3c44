//! File-backed store.
//!
//! Layout under the configured root:
//!
//! ```text
//! conversations.json          index of every conversation
//! messages/<user>.jsonl       append-only message log, one JSON object per line
//! ```
//!
//! Logs are loaded lazily per user and kept in a write-through cache, so
//! reads never hit disk after the first load. File I/O runs on
//! `spawn_blocking` to keep the runtime free.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use lt_domain::error::{Error, Result};
use lt_domain::message::{ChatMessage, Conversation, DEFAULT_TITLE};
use lt_domain::trace::TraceEvent;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::ledger::{AppendPlan, Ledger};
use crate::store::ConversationStore;

const INDEX_FILE: &str = "conversations.json";
const MESSAGES_DIR: &str = "messages";

pub struct JsonlStore {
    root: PathBuf,
    ledger: RwLock<Ledger>,
    /// Serialises every mutation: plan, write to disk, then commit to cache.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlStore {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root.join(MESSAGES_DIR)).map_err(Error::Io)?;

        let index_path = root.join(INDEX_FILE);
        let conversations: Vec<Conversation> = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).map_err(|e| {
                Error::Store(format!("corrupt {}: {e}", index_path.display()))
            })?
        } else {
            Vec::new()
        };

        tracing::debug!(conversations = conversations.len(), "conversation index loaded");

        Ok(Self {
            root: root.to_path_buf(),
            ledger: RwLock::new(Ledger::with_conversations(conversations)),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn log_path(&self, user_id: &str) -> PathBuf {
        self.root
            .join(MESSAGES_DIR)
            .join(format!("{}.jsonl", file_stem(user_id)))
    }

    /// Load `user_id`'s log into the cache if it is not there yet.
    async fn ensure_loaded(&self, user_id: &str) -> Result<()> {
        if self.ledger.read().has_log(user_id) {
            return Ok(());
        }
        let path = self.log_path(user_id);
        let uid = user_id.to_owned();
        let messages = tokio::task::spawn_blocking(move || read_log(&path, &uid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        let mut ledger = self.ledger.write();
        // Another task may have loaded (and appended) meanwhile.
        if !ledger.has_log(user_id) {
            ledger.load_log(user_id, messages);
        }
        Ok(())
    }

    async fn write_index(&self, conversations: Vec<Conversation>) -> Result<()> {
        let path = self.root.join(INDEX_FILE);
        let json = serde_json::to_string_pretty(&conversations)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, json.as_bytes()))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }

    fn index_snapshot(&self, extra: Option<&Conversation>, without: Option<Uuid>) -> Vec<Conversation> {
        let ledger = self.ledger.read();
        let mut all: Vec<Conversation> = ledger
            .conversations()
            .filter(|c| Some(c.id) != without)
            .cloned()
            .collect();
        if let Some(c) = extra {
            all.push(c.clone());
        }
        all.sort_by_key(|c| c.created_at);
        all
    }
}

#[async_trait]
impl ConversationStore for JsonlStore {
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage> {
        self.ensure_loaded(&message.user_id).await?;
        let _guard = self.write_lock.lock().await;

        let plan = self.ledger.read().plan_append(message)?;
        let (message, new_conversation) = match &plan {
            AppendPlan::Duplicate(existing) => return Ok(existing.clone()),
            AppendPlan::Insert {
                message,
                new_conversation,
            } => (message.clone(), new_conversation.clone()),
        };

        // Disk first; the cache only changes once the write succeeded.
        if let Some(conv) = &new_conversation {
            self.write_index(self.index_snapshot(Some(conv), None)).await?;
        }
        let path = self.log_path(&message.user_id);
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        tokio::task::spawn_blocking(move || {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(Error::Io)?;
            file.write_all(line.as_bytes()).map_err(Error::Io)?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.ledger.write().apply(&plan);

        TraceEvent::MessageAppended {
            conversation_id: message.conversation_id.map(|c| c.to_string()),
            role: message.role.as_str().into(),
            chars: message.content.chars().count(),
        }
        .emit();

        Ok(message)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        self.ensure_loaded(user_id).await?;
        Ok(self.ledger.read().messages(user_id, None))
    }

    async fn list_by_conversation(
        &self,
        user_id: &str,
        conversation_id: Uuid,
    ) -> Result<Vec<ChatMessage>> {
        self.ensure_loaded(user_id).await?;
        Ok(self.ledger.read().messages(user_id, Some(conversation_id)))
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<String>,
    ) -> Result<Conversation> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let conv = Conversation {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            created_at: now,
            updated_at: now,
        };
        self.write_index(self.index_snapshot(Some(&conv), None)).await?;
        self.ledger.write().insert_conversation(conv.clone());
        Ok(conv)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.ledger.read().get_conversation(id))
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.ensure_loaded(user_id).await?;
        Ok(self.ledger.read().conversations_of(user_id))
    }

    async fn delete_conversation(&self, user_id: &str, id: Uuid) -> Result<bool> {
        self.ensure_loaded(user_id).await?;
        let _guard = self.write_lock.lock().await;

        match self.ledger.read().get_conversation(id) {
            Some(c) if c.user_id == user_id => {}
            _ => return Ok(false),
        }

        // Rewrite the user's log without the conversation, then the index.
        let remaining: Vec<ChatMessage> = self
            .ledger
            .read()
            .messages(user_id, None)
            .into_iter()
            .filter(|m| m.conversation_id != Some(id))
            .collect();
        let mut buf = String::new();
        for m in &remaining {
            buf.push_str(&serde_json::to_string(m)?);
            buf.push('\n');
        }
        let path = self.log_path(user_id);
        tokio::task::spawn_blocking(move || write_atomic(&path, buf.as_bytes()))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
        self.write_index(self.index_snapshot(None, Some(id))).await?;

        Ok(self.ledger.write().remove_conversation(user_id, id))
    }

    fn backend_name(&self) -> &'static str {
        "jsonl"
    }
}

// ── file helpers ─────────────────────────────────────────────────────

/// Filesystem-safe stem for a user id. Ids made of `[A-Za-z0-9_-]` are used
/// as-is; anything else is hex-encoded.
fn file_stem(user_id: &str) -> String {
    let safe = !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if safe {
        user_id.to_owned()
    } else {
        format!("x{}", hex::encode(user_id.as_bytes()))
    }
}

/// Read a message log, skipping malformed lines.
fn read_log(path: &Path, user_id: &str) -> Result<Vec<ChatMessage>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    let mut seen = HashSet::new();
    let mut messages = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChatMessage>(line) {
            Ok(m) if seen.insert(m.id) => messages.push(m),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user_id, error = %e, "skipping malformed message line");
            }
        }
    }
    Ok(messages)
}

/// Write via a temp file and rename so readers never see a torn file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(Error::Io)?;
    std::fs::rename(&tmp, path).map_err(Error::Io)?;
    Ok(())
}
