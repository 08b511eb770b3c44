//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! `serve` and the `search` diagnostic share this so they see the same
//! wiring as the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use lt_conversations::{create_store, ConversationLockMap};
use lt_domain::config::{Config, ConfigSeverity};
use lt_providers::{LlmProvider, OpenAiCompatProvider, OpenAiTranscriber, SpeechToText};
use lt_search::{create_search, ContextRetriever};

use crate::identity::create_identity;
use crate::state::AppState;
use crate::transcription::DenylistFilter;

/// How often idle conversation locks are forgotten.
const LOCK_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

/// Log every config issue; fail on errors.
pub fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// The context retriever for `config`. Missing search config yields a
/// retriever that always returns `""`.
pub fn build_retriever(config: &Config) -> anyhow::Result<ContextRetriever> {
    let search = create_search(&config.search).context("initializing document search")?;
    Ok(ContextRetriever::new(search, config.search.max_context_chars))
}

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    check_config(&config)?;

    // ── LLM ──────────────────────────────────────────────────────────
    let api_key = config.llm_api_key();
    if api_key.is_none() {
        tracing::warn!(env = %config.llm.api_key_env, "no model API key set; requests are sent unauthenticated");
    }
    let llm: Arc<dyn LlmProvider> = Arc::new(
        OpenAiCompatProvider::from_config(&config.llm, api_key).context("initializing LLM provider")?,
    );
    tracing::info!(base_url = %config.llm.base_url, model = %config.llm.model, "LLM provider ready");

    // ── Context retrieval ────────────────────────────────────────────
    let retriever = Arc::new(build_retriever(&config)?);

    // ── Conversation store ───────────────────────────────────────────
    let store = create_store(&config.store, config.identity.url.as_deref())
        .context("initializing conversation store")?;

    // ── Identity ─────────────────────────────────────────────────────
    let identity = create_identity(&config.identity).context("initializing identity adapter")?;

    // ── Transcription ────────────────────────────────────────────────
    let speech: Option<Arc<dyn SpeechToText>> = if !config.transcription.enabled {
        tracing::info!("transcription disabled");
        None
    } else {
        match std::env::var(&config.transcription.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
        {
            Some(key) => {
                let stt = OpenAiTranscriber::from_config(&config.transcription, Some(key))
                    .context("initializing transcription client")?;
                tracing::info!(model = %config.transcription.model, "transcription ready");
                Some(Arc::new(stt))
            }
            None => {
                tracing::warn!(
                    env = %config.transcription.api_key_env,
                    "transcription enabled but no API key set; /transcribe will answer 503"
                );
                None
            }
        }
    };
    let transcript_filter = Arc::new(DenylistFilter::from_config(&config.transcription));

    Ok(AppState {
        config,
        llm,
        retriever,
        store,
        identity,
        conversation_locks: Arc::new(ConversationLockMap::new()),
        speech,
        transcript_filter,
    })
}

/// Spawn periodic housekeeping.
pub fn spawn_background_tasks(state: &AppState) {
    let locks = state.conversation_locks.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LOCK_PRUNE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            locks.prune_idle();
            tracing::debug!(tracked = locks.len(), "conversation locks pruned");
        }
    });
}
