use std::sync::Arc;

use lt_conversations::{ConversationLockMap, ConversationStore};
use lt_domain::config::Config;
use lt_providers::{LlmProvider, SpeechToText};
use lt_search::ContextRetriever;

use crate::identity::IdentityProvider;
use crate::transcription::TranscriptFilter;

/// Shared application state passed to all API handlers.
///
/// Every collaborator is an injected handle so tests can swap in fakes.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmProvider>,
    pub retriever: Arc<ContextRetriever>,
    pub store: Arc<dyn ConversationStore>,

    // ── Request scope ─────────────────────────────────────────────────
    pub identity: Arc<dyn IdentityProvider>,
    /// Serialises turns per conversation.
    pub conversation_locks: Arc<ConversationLockMap>,

    // ── Voice input ───────────────────────────────────────────────────
    /// `None` when transcription is disabled or has no API key.
    pub speech: Option<Arc<dyn SpeechToText>>,
    pub transcript_filter: Arc<dyn TranscriptFilter>,
}
