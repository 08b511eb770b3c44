use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /health`: liveness plus which optional collaborators are wired.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.backend_name(),
        "model": state.llm.provider_id(),
        "search": state.retriever.is_enabled(),
        "identity": state.identity.name(),
        "transcription": state.speech.is_some(),
    }))
}
