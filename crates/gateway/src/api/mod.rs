pub mod auth;
pub mod chat;
pub mod conversations;
pub mod health;
pub mod transcribe;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Room for multipart framing around the audio payload.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (the identity adapter must resolve a principal first).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let upload_limit = state.config.transcription.max_upload_bytes + MULTIPART_OVERHEAD;

    let public = Router::new().route("/health", get(health::health));

    let protected = Router::new()
        // Chat (core runtime)
        .route("/chat", post(chat::chat))
        // Voice input
        .route(
            "/transcribe",
            post(transcribe::transcribe).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // History
        .route("/messages", get(conversations::list_messages))
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/conversations/:id", delete(conversations::delete_conversation))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_principal,
        ));

    public.merge(protected)
}
