//! `lt-conversations`: durable chat history for LexTutor.
//!
//! Messages are append-only and ordered by `created_at` within a
//! conversation. Three backends implement [`ConversationStore`]:
//!
//! | Backend     | Type              | Notes                                   |
//! |-------------|-------------------|-----------------------------------------|
//! | `jsonl`     | [`JsonlStore`]    | One JSONL log per user + a JSON index   |
//! | `memory`    | [`MemoryStore`]   | Tests and throwaway dev servers         |
//! | `postgrest` | [`PostgrestStore`]| Supabase `messages` / `conversations`   |
//!
//! [`ConversationLockMap`] serialises turns that write to the same
//! conversation.

mod ledger;
pub mod jsonl;
pub mod lock;
pub mod memory;
pub mod postgrest;
pub mod store;

pub use jsonl::JsonlStore;
pub use lock::{ConversationBusy, ConversationLockMap};
pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use store::ConversationStore;

use std::sync::Arc;

use lt_domain::config::{StoreBackend, StoreConfig};
use lt_domain::error::{Error, Result};

/// Build the configured backend. `fallback_url` (the identity provider URL)
/// is used by `postgrest` when `store.postgrest.url` is unset.
pub fn create_store(
    cfg: &StoreConfig,
    fallback_url: Option<&str>,
) -> Result<Arc<dyn ConversationStore>> {
    match cfg.backend {
        StoreBackend::Jsonl => {
            let store = JsonlStore::open(&cfg.path)?;
            tracing::info!(path = %cfg.path.display(), "jsonl conversation store ready");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("in-memory conversation store: history is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgrest => {
            let url = cfg
                .postgrest
                .url
                .as_deref()
                .or(fallback_url)
                .ok_or_else(|| Error::Config("store.postgrest.url is not set".into()))?;
            let key = std::env::var(&cfg.postgrest.key_env).map_err(|_| {
                Error::Config(format!(
                    "environment variable '{}' not set",
                    cfg.postgrest.key_env
                ))
            })?;
            let store = PostgrestStore::new(url, key, &cfg.postgrest)?;
            tracing::info!(url = %url, "postgrest conversation store ready");
            Ok(Arc::new(store))
        }
    }
}
