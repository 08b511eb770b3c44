use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Root directory for the `jsonl` backend.
    #[serde(default = "d_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub postgrest: PostgrestConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: d_path(),
            postgrest: PostgrestConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Jsonl,
    Memory,
    Postgrest,
}

/// Supabase REST tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgrestConfig {
    /// Base URL; `/rest/v1` is appended. Falls back to `identity.url`.
    #[serde(default)]
    pub url: Option<String>,
    /// Env var holding the service-role key.
    #[serde(default = "d_key_env")]
    pub key_env: String,
    #[serde(default = "d_messages_table")]
    pub messages_table: String,
    #[serde(default = "d_conversations_table")]
    pub conversations_table: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
}

impl Default for PostgrestConfig {
    fn default() -> Self {
        Self {
            url: None,
            key_env: d_key_env(),
            messages_table: d_messages_table(),
            conversations_table: d_conversations_table(),
            timeout_ms: d_timeout_ms(),
            max_retries: d_max_retries(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_path() -> PathBuf {
    PathBuf::from("./data/conversations")
}
fn d_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".into()
}
fn d_messages_table() -> String {
    "messages".into()
}
fn d_conversations_table() -> String {
    "conversations".into()
}
fn d_timeout_ms() -> u64 {
    5_000
}
fn d_max_retries() -> u32 {
    2
}
