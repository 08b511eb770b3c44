//! Conversation history endpoints. Everything is scoped to the
//! authenticated principal; another user's conversation is a 404.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lt_domain::message::{Conversation, Message};
use lt_domain::principal::Principal;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationSummary {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            title: c.title,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

async fn owned(state: &AppState, principal: &Principal, id: Uuid) -> Result<Conversation, ApiError> {
    match state.store.get_conversation(id).await? {
        Some(c) if c.user_id == principal.id => Ok(c),
        _ => Err(ApiError::NotFound("Conversación no encontrada".into())),
    }
}

// ── GET /messages ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

/// `[{role, content}]`, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = match q.conversation_id {
        Some(id) => {
            owned(&state, &principal, id).await?;
            state.store.list_by_conversation(&principal.id, id).await?
        }
        None => state.store.list_by_user(&principal.id).await?,
    };
    Ok(Json(messages.iter().map(|m| m.to_prompt()).collect()))
}

// ── /conversations ──────────────────────────────────────────────────

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let list = state.store.list_conversations(&principal.id).await?;
    Ok(Json(list.into_iter().map(ConversationSummary::from).collect()))
}

#[derive(Debug, Default, Deserialize)]
pub struct NewConversation {
    #[serde(default)]
    pub title: Option<String>,
}

/// "New chat". The body is optional.
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Option<Json<NewConversation>>,
) -> Result<Response, ApiError> {
    let title = body
        .and_then(|Json(b)| b.title)
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty());
    let conv = state.store.create_conversation(&principal.id, title).await?;
    tracing::info!(user_id = %principal.id, conversation_id = %conv.id, "conversation created");
    Ok((StatusCode::CREATED, Json(ConversationSummary::from(conv))).into_response())
}

/// Administrative delete; outside the append-only turn path.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_conversation(&principal.id, id).await? {
        tracing::info!(user_id = %principal.id, conversation_id = %id, "conversation deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Conversación no encontrada".into()))
    }
}
