//! Drives the OpenAI-compatible adapter against an in-process HTTP server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures_util::StreamExt;
use lt_domain::config::LlmConfig;
use lt_domain::error::Error;
use lt_domain::message::Message;
use lt_domain::stream::StreamEvent;
use lt_providers::{ChatRequest, LlmProvider, OpenAiCompatProvider};
use tokio::net::TcpListener;

const SSE_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"El dolo \"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"es la intención.\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

#[derive(Clone)]
struct Upstream {
    calls: Arc<AtomicUsize>,
    /// Number of initial calls answered with 503.
    failures: usize,
    status: StatusCode,
}

async fn completions(
    State(up): State<Upstream>,
    Json(body): Json<serde_json::Value>,
) -> axum::response::Response {
    let n = up.calls.fetch_add(1, Ordering::SeqCst);
    if n < up.failures {
        return (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response();
    }
    if up.status != StatusCode::OK {
        return (up.status, "{\"error\":{\"message\":\"bad\"}}").into_response();
    }
    if body["stream"] == true {
        ([(header::CONTENT_TYPE, "text/event-stream")], SSE_BODY).into_response()
    } else {
        Json(serde_json::json!({
            "model": body["model"],
            "choices": [{"message": {"content": "El dolo es la intención."}, "finish_reason": "stop"}]
        }))
        .into_response()
    }
}

async fn start_upstream(failures: usize, status: StatusCode) -> (SocketAddr, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let state = Upstream {
        calls: calls.clone(),
        failures,
        status,
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, calls)
}

fn provider(addr: SocketAddr, max_retries: u32) -> OpenAiCompatProvider {
    let cfg = LlmConfig {
        base_url: format!("http://{addr}/v1"),
        max_retries,
        ..LlmConfig::default()
    };
    OpenAiCompatProvider::from_config(&cfg, Some("sk-test".into())).unwrap()
}

fn request() -> ChatRequest {
    ChatRequest {
        messages: vec![Message::user("¿Qué es el dolo?")],
        ..Default::default()
    }
}

#[tokio::test]
async fn streamed_tokens_concatenate_to_full_reply() {
    let (addr, _) = start_upstream(0, StatusCode::OK).await;
    let p = provider(addr, 0);

    let mut stream = p.chat_stream(&request()).await.unwrap();
    let mut text = String::new();
    let mut done = 0;
    while let Some(ev) = stream.next().await {
        match ev.unwrap() {
            StreamEvent::Token { text: t } => text.push_str(&t),
            StreamEvent::Done { .. } => done += 1,
            StreamEvent::Error { message } => panic!("{message}"),
        }
    }
    assert_eq!(text, "El dolo es la intención.");
    assert_eq!(done, 1);

    let full = p.chat(&request()).await.unwrap();
    assert_eq!(full.content, text);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let (addr, calls) = start_upstream(2, StatusCode::OK).await;
    let p = provider(addr, 2);
    let resp = p.chat(&request()).await.unwrap();
    assert_eq!(resp.content, "El dolo es la intención.");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (addr, calls) = start_upstream(0, StatusCode::BAD_REQUEST).await;
    let p = provider(addr, 3);
    let err = p.chat_stream(&request()).await.err().unwrap();
    assert!(matches!(err, Error::Provider { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_key_maps_to_auth() {
    let (addr, _) = start_upstream(0, StatusCode::UNAUTHORIZED).await;
    let err = provider(addr, 1).chat(&request()).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}
