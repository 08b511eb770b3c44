//! Turn execution: persist the question, ground it, call the model, relay
//! the answer and record it.
//!
//! Entry point: [`run_turn`] spawns the turn and returns a channel of
//! [`TurnEvent`]s. The channel closes only after the assistant message is
//! persisted (or persistence has given up), so a client that sees the end
//! of the stream can immediately read the answer back from history.

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tracing::Instrument;
use uuid::Uuid;

use lt_domain::message::{ChatMessage, Message, Role};
use lt_domain::principal::Principal;
use lt_domain::retry::backoff;
use lt_domain::stream::StreamEvent;
use lt_domain::trace::TraceEvent;
use lt_providers::ChatRequest;

use super::prompt;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted during a single turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// Incremental text from the model (streaming turns only).
    #[serde(rename = "delta")]
    Delta { text: String },

    /// The full reply. Sent after persistence.
    #[serde(rename = "final")]
    Final { content: String },

    /// The model call failed. Detail for logs, not for clients.
    #[serde(rename = "error")]
    Error { message: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Input to a single turn. The caller has already authenticated the
/// principal and checked conversation ownership.
pub struct TurnInput {
    pub principal: Principal,
    pub conversation_id: Option<Uuid>,
    /// Prior turns, oldest first. Windowed during prompt assembly.
    pub history: Vec<Message>,
    pub message: String,
    /// Name the client asked the tutor to use.
    pub student_name: Option<String>,
    /// Relay fragments as they arrive instead of one final reply.
    pub stream: bool,
}

/// What happened to the model output.
#[derive(Debug, Default)]
struct Generation {
    text: String,
    /// Set when the model call failed; the text is then not an answer.
    failure: Option<String>,
    client_disconnected: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one turn in the background.
///
/// `permit` is the conversation lock; it is held until the turn has
/// finished persisting.
pub fn run_turn(
    state: AppState,
    input: TurnInput,
    permit: OwnedSemaphorePermit,
) -> (Uuid, mpsc::Receiver<TurnEvent>) {
    let (tx, rx) = mpsc::channel::<TurnEvent>(64);
    let turn_id = Uuid::new_v4();

    let turn_span = tracing::info_span!(
        "turn",
        %turn_id,
        user_id = %input.principal.id,
        conversation_id = ?input.conversation_id,
        streaming = input.stream,
        "otel.kind" = "SERVER",
    );

    tokio::spawn(
        async move {
            let _permit = permit;
            tracing::debug!("turn started");
            run_turn_inner(&state, input, &tx, turn_id).await;
        }
        .instrument(turn_span),
    );

    (turn_id, rx)
}

async fn run_turn_inner(
    state: &AppState,
    input: TurnInput,
    tx: &mpsc::Sender<TurnEvent>,
    turn_id: Uuid,
) {
    let cfg = &state.config;
    let user_id = input.principal.id.clone();

    // ── 1. Persist the question before anything can fail ─────────────
    let question = ChatMessage::new(&user_id, input.conversation_id, Role::User, &input.message);
    if let Err(e) = state.store.append(question).await {
        tracing::error!(error = %e, "failed to persist user turn; continuing");
    }

    // ── 2. Context (best effort, never fails) ────────────────────────
    let context = state.retriever.retrieve(&input.message).await;

    // ── 3. Prompt ────────────────────────────────────────────────────
    let student = prompt::student_name(
        &input.principal,
        input.student_name.as_deref(),
        &cfg.chat.default_student_name,
    );
    let persona = prompt::persona(cfg.chat.persona_template.as_deref(), &student);
    let req = ChatRequest {
        messages: prompt::assemble(
            &persona,
            &context,
            &input.history,
            cfg.chat.max_history_messages,
            &input.message,
        ),
        temperature: Some(cfg.llm.temperature),
        max_tokens: cfg.llm.max_tokens,
        model: None,
    };
    tracing::debug!(
        prompt_messages = req.messages.len(),
        has_context = !context.is_empty(),
        "prompt assembled"
    );

    // ── 4/5. Model call + relay ──────────────────────────────────────
    let generation = if input.stream {
        relay_stream(state, &req, tx).await
    } else {
        complete(state, &req).await
    };

    if let Some(failure) = &generation.failure {
        tracing::error!(error = %failure, partial_chars = generation.text.len(), "model call failed");
        let _ = tx
            .send(TurnEvent::Error {
                message: failure.clone(),
            })
            .await;
        finish(turn_id, &input, &generation, false);
        return;
    }

    // ── 6. Persist the answer ────────────────────────────────────────
    let keep = !generation.client_disconnected || cfg.chat.persist_partial_on_disconnect;
    let mut persisted = false;
    if keep && !generation.text.is_empty() {
        let answer = ChatMessage::new(
            &user_id,
            input.conversation_id,
            Role::Assistant,
            &generation.text,
        );
        persisted = persist_with_retry(state, answer, cfg.chat.persist_retries).await;
    }

    let _ = tx
        .send(TurnEvent::Final {
            content: generation.text.clone(),
        })
        .await;
    finish(turn_id, &input, &generation, persisted);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model relay
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn complete(state: &AppState, req: &ChatRequest) -> Generation {
    match state.llm.chat(req).await {
        Ok(resp) => Generation {
            text: resp.content,
            ..Default::default()
        },
        Err(e) => Generation {
            failure: Some(e.to_string()),
            ..Default::default()
        },
    }
}

/// Forward tokens as they arrive. A closed channel means the client went
/// away: stop reading so the upstream request is dropped.
async fn relay_stream(
    state: &AppState,
    req: &ChatRequest,
    tx: &mpsc::Sender<TurnEvent>,
) -> Generation {
    let mut generation = Generation::default();

    let mut upstream = match state.llm.chat_stream(req).await {
        Ok(s) => s,
        Err(e) => {
            generation.failure = Some(e.to_string());
            return generation;
        }
    };

    while let Some(item) = upstream.next().await {
        match item {
            Ok(StreamEvent::Token { text }) => {
                if text.is_empty() {
                    continue;
                }
                generation.text.push_str(&text);
                if tx.send(TurnEvent::Delta { text }).await.is_err() {
                    tracing::info!(
                        chars = generation.text.chars().count(),
                        "client disconnected; cancelling generation"
                    );
                    generation.client_disconnected = true;
                    break;
                }
            }
            Ok(StreamEvent::Done { finish_reason, .. }) => {
                tracing::debug!(?finish_reason, "model stream finished");
                break;
            }
            Ok(StreamEvent::Error { message }) => {
                generation.failure = Some(message);
                break;
            }
            Err(e) => {
                generation.failure = Some(e.to_string());
                break;
            }
        }
    }

    generation
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Append with bounded retries. The message id stays the same across
/// attempts, so an append that landed but whose ack was lost is not
/// duplicated.
async fn persist_with_retry(state: &AppState, message: ChatMessage, retries: u32) -> bool {
    for attempt in 0..=retries {
        if attempt > 0 {
            tokio::time::sleep(backoff(100, attempt)).await;
        }
        match state.store.append(message.clone()).await {
            Ok(_) => return true,
            Err(e) => {
                tracing::warn!(attempt, error = %e, "failed to persist assistant turn");
            }
        }
    }
    tracing::error!(
        message_id = %message.id,
        chars = message.content.chars().count(),
        "assistant turn lost from history; the client already has it"
    );
    false
}

fn finish(turn_id: Uuid, input: &TurnInput, generation: &Generation, persisted: bool) {
    TraceEvent::TurnFinished {
        turn_id: turn_id.to_string(),
        conversation_id: input.conversation_id.map(|c| c.to_string()),
        reply_chars: generation.text.chars().count(),
        persisted,
        client_disconnected: generation.client_disconnected,
    }
    .emit();
}
