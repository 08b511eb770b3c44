#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use lt_conversations::{ConversationLockMap, ConversationStore, MemoryStore};
use lt_domain::config::Config;
use lt_domain::error::{Error, Result};
use lt_domain::message::{ChatMessage, Conversation, Role};
use lt_domain::principal::Principal;
use lt_domain::stream::{BoxStream, StreamEvent};
use lt_gateway::identity::IdentityProvider;
use lt_gateway::state::AppState;
use lt_gateway::transcription::DenylistFilter;
use lt_providers::{AudioUpload, ChatRequest, ChatResponse, LlmProvider, SpeechToText};
use lt_search::{ContextRetriever, DocumentSearch, NoopSearch, Passage};

// ── LLM ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LlmMode {
    Ok,
    FailBeforeOutput,
    FailMidStream,
}

/// Replies with a fixed text; streams it in small fragments.
pub struct FakeLlm {
    pub reply: String,
    pub mode: LlmMode,
    /// Pause between streamed fragments.
    pub token_delay: Duration,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl FakeLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_owned(),
            mode: LlmMode::Ok,
            token_delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mode: LlmMode) -> Self {
        Self {
            mode,
            ..Self::new("respuesta parcial que no llega")
        }
    }

    pub fn fragments(&self) -> Vec<String> {
        let chars: Vec<char> = self.reply.chars().collect();
        chars.chunks(4).map(|c| c.iter().collect()).collect()
    }

    pub fn last_request(&self) -> ChatRequest {
        self.requests.lock().last().cloned().expect("no model request recorded")
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req.clone());
        if self.mode != LlmMode::Ok {
            return Err(Error::Provider {
                provider: "fake".into(),
                message: "HTTP 500 - boom".into(),
            });
        }
        Ok(ChatResponse {
            content: self.reply.clone(),
            usage: None,
            model: "fake-model".into(),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.requests.lock().push(req.clone());
        if self.mode == LlmMode::FailBeforeOutput {
            return Err(Error::Timeout("model timed out".into()));
        }
        let fragments = self.fragments();
        let delay = self.token_delay;
        let fail_mid = self.mode == LlmMode::FailMidStream;
        Ok(Box::pin(async_stream::stream! {
            for (i, text) in fragments.into_iter().enumerate() {
                if fail_mid && i == 2 {
                    yield Err(Error::Http("connection reset".into()));
                    return;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(StreamEvent::Token { text });
            }
            yield Ok(StreamEvent::Done { usage: None, finish_reason: Some("stop".into()) });
        }))
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

// ── Search ──────────────────────────────────────────────────────────

pub struct FakeSearch {
    pub passages: Option<Vec<Passage>>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn returning(passages: Vec<Passage>) -> Self {
        Self {
            passages: Some(passages),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            passages: None,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DocumentSearch for FakeSearch {
    async fn search(&self, query: &str) -> Result<Vec<Passage>> {
        self.queries.lock().push(query.to_owned());
        self.passages
            .clone()
            .ok_or_else(|| Error::Search("simulated network error".into()))
    }
}

pub fn two_passages() -> Vec<Passage> {
    vec![
        Passage {
            title: "Código Penal".into(),
            snippet: "Artículo 10. Son delitos las acciones y omisiones dolosas o imprudentes.".into(),
            link: Some("gs://manuales/cp.pdf".into()),
        },
        Passage {
            title: "Manual de Derecho Penal".into(),
            snippet: "El dolo es conocimiento y voluntad de realizar el tipo.".into(),
            link: None,
        },
    ]
}

// ── Identity ────────────────────────────────────────────────────────

/// `Authorization: Bearer <user id>` for the users it knows.
pub struct FakeIdentity {
    users: HashMap<String, Principal>,
}

impl FakeIdentity {
    pub fn new(users: Vec<Principal>) -> Self {
        Self {
            users: users.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<Principal>> {
        let token = lt_gateway::identity::cookie::bearer_token(headers);
        Ok(token.and_then(|t| self.users.get(&t).cloned()))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub fn ana() -> Principal {
    Principal::new("ana-id").with_display_name("Ana")
}

pub fn luis() -> Principal {
    Principal::new("luis-id")
}

// ── Store ───────────────────────────────────────────────────────────

/// Memory store whose assistant appends always fail.
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub assistant_attempts: Mutex<u32>,
}

#[async_trait]
impl ConversationStore for FlakyStore {
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage> {
        if message.role == Role::Assistant {
            *self.assistant_attempts.lock() += 1;
            return Err(Error::Store("disk full".into()));
        }
        self.inner.append(message).await
    }
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        self.inner.list_by_user(user_id).await
    }
    async fn list_by_conversation(&self, user_id: &str, id: Uuid) -> Result<Vec<ChatMessage>> {
        self.inner.list_by_conversation(user_id, id).await
    }
    async fn create_conversation(&self, user_id: &str, title: Option<String>) -> Result<Conversation> {
        self.inner.create_conversation(user_id, title).await
    }
    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.inner.get_conversation(id).await
    }
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.inner.list_conversations(user_id).await
    }
    async fn delete_conversation(&self, user_id: &str, id: Uuid) -> Result<bool> {
        self.inner.delete_conversation(user_id, id).await
    }
    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

// ── Speech ──────────────────────────────────────────────────────────

pub struct FakeSpeech {
    pub text: String,
    pub received: Mutex<Vec<AudioUpload>>,
}

impl FakeSpeech {
    pub fn saying(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            received: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String> {
        self.received.lock().push(audio);
        Ok(self.text.clone())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub state: AppState,
    pub llm: Arc<FakeLlm>,
    pub store: Arc<dyn ConversationStore>,
}

pub struct HarnessBuilder {
    config: Config,
    llm: FakeLlm,
    search: Arc<dyn DocumentSearch>,
    store: Arc<dyn ConversationStore>,
    speech: Option<Arc<dyn SpeechToText>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            llm: FakeLlm::new("¿Qué crees tú que significa actuar con dolo, Ana?"),
            search: Arc::new(NoopSearch),
            store: Arc::new(MemoryStore::new()),
            speech: None,
        }
    }

    pub fn llm(mut self, llm: FakeLlm) -> Self {
        self.llm = llm;
        self
    }

    pub fn search(mut self, search: Arc<dyn DocumentSearch>) -> Self {
        self.search = search;
        self
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = store;
        self
    }

    pub fn speech(mut self, speech: Arc<dyn SpeechToText>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn config(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn build(self) -> Harness {
        let llm = Arc::new(self.llm);
        let config = Arc::new(self.config);
        let state = AppState {
            retriever: Arc::new(ContextRetriever::new(self.search, config.search.max_context_chars)),
            transcript_filter: Arc::new(DenylistFilter::from_config(&config.transcription)),
            config,
            llm: llm.clone(),
            store: self.store.clone(),
            identity: Arc::new(FakeIdentity::new(vec![ana(), luis()])),
            conversation_locks: Arc::new(ConversationLockMap::new()),
            speech: self.speech,
        };
        Harness {
            state,
            llm,
            store: self.store,
        }
    }
}

impl Harness {
    pub fn app(&self) -> Router {
        lt_gateway::api::router(self.state.clone()).with_state(self.state.clone())
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let resp = self.app().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, headers, body)
    }

    pub async fn post_json(
        &self,
        path: &str,
        user: Option<&Principal>,
        body: serde_json::Value,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut req = Request::post(path).header("content-type", "application/json");
        if let Some(p) = user {
            req = req.header("authorization", format!("Bearer {}", p.id));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn get(&self, path: &str, user: Option<&Principal>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut req = Request::get(path);
        if let Some(p) = user {
            req = req.header("authorization", format!("Bearer {}", p.id));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }
}

pub fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}
