use serde::Serialize;

/// Structured trace events emitted across all LexTutor crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ContextRetrieved {
        query_chars: usize,
        passages: usize,
        context_chars: usize,
        degraded: bool,
    },
    SearchCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    MessageAppended {
        conversation_id: Option<String>,
        role: String,
        chars: usize,
    },
    TurnFinished {
        turn_id: String,
        conversation_id: Option<String>,
        reply_chars: usize,
        persisted: bool,
        client_disconnected: bool,
    },
    TranscriptionFiltered {
        raw_chars: usize,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "lt_event");
    }
}
