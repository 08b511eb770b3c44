//! `lt-search`: context retrieval for LexTutor.
//!
//! Queries a Vertex AI Search (Discovery Engine) serving config with the
//! student's raw message, reduces the top results to a few titled
//! passages and formats them into a delimited system-context block.
//!
//! The pieces:
//!
//! | Item                  | Role                                              |
//! |-----------------------|---------------------------------------------------|
//! | [`DocumentSearch`]    | Backend trait; returns extracted [`Passage`]s     |
//! | [`VertexSearchClient`]| Discovery Engine REST client with retry           |
//! | [`GoogleTokenSource`] | OAuth access tokens from Google credentials       |
//! | [`ContextRetriever`]  | Total wrapper: always yields a (possibly empty) block |
//!
//! Use [`create_search`] to build the backend from `[search]` config. An
//! incomplete config yields [`NoopSearch`], so retrieval degrades to "no
//! context" instead of failing startup.

pub mod auth;
pub mod context;
pub mod provider;
pub mod types;
pub mod vertex;

pub use auth::GoogleTokenSource;
pub use context::{context_block, format_passages, ContextRetriever, PassageExtractor};
pub use provider::{DocumentSearch, NoopSearch};
pub use types::Passage;
pub use vertex::VertexSearchClient;

use std::sync::Arc;

use lt_domain::config::SearchConfig;
use lt_domain::error::Result;

/// Build the search backend for `cfg`.
///
/// Missing index identifiers, missing credentials and unusable credentials
/// (unreadable key file, malformed JSON) all produce [`NoopSearch`] with a
/// warning; retrieval never blocks startup.
pub fn create_search(cfg: &SearchConfig) -> Result<Arc<dyn DocumentSearch>> {
    if !cfg.enabled() {
        tracing::warn!("search index not configured; context retrieval disabled");
        return Ok(Arc::new(NoopSearch));
    }
    let tokens = match GoogleTokenSource::from_config(&cfg.credentials) {
        Ok(Some(tokens)) => tokens,
        Ok(None) => {
            tracing::warn!("no Google credentials found; context retrieval disabled");
            return Ok(Arc::new(NoopSearch));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Google credentials unusable; context retrieval disabled");
            return Ok(Arc::new(NoopSearch));
        }
    };
    let client = VertexSearchClient::new(cfg, tokens)?;
    tracing::info!(endpoint = %client.endpoint(), "vertex search client ready");
    Ok(Arc::new(client))
}
