//! `POST /chat`: the primary interface for running a tutoring turn.
//!
//! - `stream: true` (default): raw `text/plain` body, fragments written as
//!   the model produces them. The body ends once the answer is persisted.
//! - `stream: false`: `{ "reply": ..., "conversationId": ... }`.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use futures_core::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use lt_conversations::{ConversationBusy, ConversationLockMap};
use lt_domain::message::Message;
use lt_domain::principal::Principal;

use crate::error::ApiError;
use crate::runtime::{run_turn, TurnEvent, TurnInput};
use crate::state::AppState;

/// How long a turn waits for an earlier turn in the same conversation.
const LOCK_WAIT: Duration = Duration::from_secs(30);

pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    /// Prior turns as the client sees them. Read from the store when
    /// omitted and a conversation id is given.
    #[serde(default)]
    pub history: Option<Vec<Message>>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default = "d_true")]
    pub stream: bool,
}

fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(format!("Cuerpo inválido: {e}")))?;

    let message = body
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("El mensaje es obligatorio".into()))?
        .to_owned();

    // ── Ownership ────────────────────────────────────────────────────
    if let Some(cid) = body.conversation_id {
        if let Some(conv) = state.store.get_conversation(cid).await? {
            if conv.user_id != principal.id {
                tracing::warn!(user_id = %principal.id, conversation_id = %cid, "foreign conversation requested");
                return Err(ApiError::NotFound("Conversación no encontrada".into()));
            }
        }
    }

    // ── Lock ─────────────────────────────────────────────────────────
    let key = ConversationLockMap::key(&principal.id, body.conversation_id);
    let permit = state
        .conversation_locks
        .acquire(&key, LOCK_WAIT)
        .await
        .map_err(|ConversationBusy| {
            ApiError::Busy("Ya hay una respuesta en curso en esta conversación".into())
        })?;

    // ── History ──────────────────────────────────────────────────────
    let history = match (body.history, body.conversation_id) {
        (Some(h), _) => h,
        (None, Some(cid)) => match state.store.list_by_conversation(&principal.id, cid).await {
            Ok(msgs) => msgs.iter().map(|m| m.to_prompt()).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "history read failed; continuing without history");
                Vec::new()
            }
        },
        (None, None) => Vec::new(),
    };

    let input = TurnInput {
        principal,
        conversation_id: body.conversation_id,
        history,
        message,
        student_name: body.student_name,
        stream: body.stream,
    };
    let (_turn_id, rx) = run_turn(state.clone(), input, permit);

    if body.stream {
        streamed(rx, body.conversation_id).await
    } else {
        collected(rx, body.conversation_id).await
    }
}

/// Drain the turn and return one JSON reply.
async fn collected(
    mut rx: mpsc::Receiver<TurnEvent>,
    conversation_id: Option<Uuid>,
) -> Result<Response, ApiError> {
    let mut reply = None;
    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Final { content } => reply = Some(content),
            TurnEvent::Error { message } => return Err(ApiError::Internal(message)),
            TurnEvent::Delta { .. } => { /* ignored in non-streaming */ }
        }
    }
    let reply = reply.ok_or_else(|| ApiError::Internal("turn ended without a reply".into()))?;
    Ok(Json(json!({ "reply": reply, "conversationId": conversation_id })).into_response())
}

/// Wait for the first event so a model failure before any output is still
/// a clean 500, then hand the rest to the body.
async fn streamed(
    mut rx: mpsc::Receiver<TurnEvent>,
    conversation_id: Option<Uuid>,
) -> Result<Response, ApiError> {
    let first = match rx.recv().await {
        Some(TurnEvent::Error { message }) => return Err(ApiError::Internal(message)),
        Some(event) => event,
        None => return Err(ApiError::Internal("turn ended without output".into())),
    };

    let mut response = Body::from_stream(text_stream(first, rx)).into_response();
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(cid) = conversation_id {
        if let Ok(v) = HeaderValue::from_str(&cid.to_string()) {
            headers.insert(CONVERSATION_ID_HEADER, v);
        }
    }
    Ok(response)
}

/// Body chunks for a streamed turn. An error after output has started
/// aborts the body, so the client sees a broken transfer rather than a
/// truncated answer that looks complete.
fn text_stream(
    first: TurnEvent,
    mut rx: mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        let mut next = Some(first);
        while let Some(event) = next {
            match event {
                TurnEvent::Delta { text } => yield Ok(Bytes::from(text)),
                TurnEvent::Final { .. } => break,
                TurnEvent::Error { message } => {
                    tracing::error!(error = %message, "model stream failed mid-reply");
                    yield Err(std::io::Error::other("generation failed"));
                    break;
                }
            }
            next = rx.recv().await;
        }
        // rx drops here; the turn notices on its next send.
    }
}
