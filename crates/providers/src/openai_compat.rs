//! OpenAI-compatible chat completions adapter.
//!
//! Works with OpenAI and any endpoint that follows the
//! `/chat/completions` contract (Azure-style proxies, vLLM, Ollama).

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, send_with_retry};
use lt_domain::config::LlmConfig;
use lt_domain::error::{Error, Result};
use lt_domain::message::Message;
use lt_domain::stream::{BoxStream, StreamEvent, Usage};
use lt_domain::trace::TraceEvent;
use serde_json::Value;
use std::time::{Duration, Instant};

const PROVIDER: &str = "openai_compat";
const RETRY_BASE_MS: u64 = 250;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Build from the `[llm]` config section. `api_key` may be `None` for
    /// local endpoints that do not check auth.
    pub fn from_config(cfg: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        // Only the connect phase is bounded; a streamed body may legitimately
        // take longer than `timeout_ms`.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            max_retries: cfg.max_retries,
            client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let rb = self.client.post(url);
        match &self.api_key {
            Some(key) => rb.bearer_auth(key),
            None => rb,
        }
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "stream": stream,
            "temperature": req.temperature.unwrap_or(self.temperature),
        });

        if let Some(max) = req.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = serde_json::json!(max);
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_openai(msg: &Message) -> Value {
    serde_json::json!({
        "role": msg.role.as_str(),
        "content": msg.content,
    })
}

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: PROVIDER.into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: PROVIDER.into(),
        message: "no message in choice".into(),
    })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(ChatResponse {
        content,
        usage: body.get("usage").and_then(parse_usage),
        model,
        finish_reason,
    })
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

/// Map one SSE payload to stream events.
///
/// `finish_reason` is not terminal: with `include_usage` a usage-only chunk
/// follows it, and `[DONE]` closes the stream.
fn parse_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("stream error")
            .to_string();
        return vec![Ok(StreamEvent::Error { message })];
    }

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    let Some(choice) = choice else {
        // Usage-only chunk.
        return match v.get("usage").and_then(parse_usage) {
            Some(usage) => vec![Ok(StreamEvent::Done {
                usage: Some(usage),
                finish_reason: None,
            })],
            None => Vec::new(),
        };
    };

    match choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
    {
        Some(text) if !text.is_empty() => vec![Ok(StreamEvent::Token {
            text: text.to_string(),
        })],
        _ => Vec::new(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = self.chat_url();
        let body = self.build_chat_body(req, false);
        let model = self.effective_model(req);
        let start = Instant::now();

        tracing::debug!(provider = PROVIDER, url = %url, model = %model, "chat request");

        let resp = send_with_retry(PROVIDER, self.max_retries, RETRY_BASE_MS, || {
            self.authed_post(&url).json(&body)
        })
        .await?;

        let resp_text = resp.text().await.map_err(from_reqwest)?;
        let resp_json: Value = serde_json::from_str(&resp_text)?;
        let parsed = parse_chat_response(&resp_json)?;

        TraceEvent::LlmRequest {
            provider: PROVIDER.into(),
            model,
            streaming: false,
            duration_ms: start.elapsed().as_millis() as u64,
            prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();

        Ok(parsed)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.chat_url();
        let body = self.build_chat_body(req, true);
        let model = self.effective_model(req);
        let start = Instant::now();

        tracing::debug!(provider = PROVIDER, url = %url, model = %model, "stream request");

        // Retries stop once headers arrive; nothing has been relayed yet.
        let resp = send_with_retry(PROVIDER, self.max_retries, RETRY_BASE_MS, || {
            self.authed_post(&url).json(&body)
        })
        .await?;

        TraceEvent::LlmRequest {
            provider: PROVIDER.into(),
            model,
            streaming: true,
            duration_ms: start.elapsed().as_millis() as u64,
            prompt_tokens: None,
            completion_tokens: None,
        }
        .emit();

        Ok(crate::sse::sse_response_stream(resp, parse_sse_data))
    }

    fn provider_id(&self) -> &str {
        PROVIDER
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::from_config(&LlmConfig::default(), Some("sk-test".into())).unwrap()
    }

    #[test]
    fn body_carries_temperature_and_roles() {
        let req = ChatRequest {
            messages: vec![Message::system("persona"), Message::user("¿Qué es el dolo?")],
            ..Default::default()
        };
        let body = provider().build_chat_body(&req, true);
        assert_eq!(body["model"], "gpt-4o");
        assert!((body["temperature"].as_f64().unwrap() - 0.4).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "¿Qué es el dolo?");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn request_overrides_win() {
        let req = ChatRequest {
            messages: vec![Message::user("hola")],
            temperature: Some(0.0),
            max_tokens: Some(100),
            model: Some("gpt-4o-mini".into()),
        };
        let body = provider().build_chat_body(&req, false);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["temperature"], 0.0);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn parses_text_delta() {
        let events = parse_sse_data(r#"{"choices":[{"delta":{"content":"Hola"}}]}"#);
        assert!(matches!(&events[..], [Ok(StreamEvent::Token { text })] if text == "Hola"));
    }

    #[test]
    fn finish_reason_chunk_is_not_terminal() {
        let events = parse_sse_data(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        assert!(events.is_empty());
    }

    #[test]
    fn usage_chunk_becomes_done() {
        let events = parse_sse_data(
            r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":5,"total_tokens":8}}"#,
        );
        match &events[..] {
            [Ok(StreamEvent::Done { usage: Some(u), .. })] => assert_eq!(u.total_tokens, 8),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn upstream_error_payload_surfaces() {
        let events = parse_sse_data(r#"{"error":{"message":"quota exceeded"}}"#);
        assert!(
            matches!(&events[..], [Ok(StreamEvent::Error { message })] if message == "quota exceeded")
        );
    }

    #[test]
    fn malformed_payload_is_json_error() {
        let events = parse_sse_data("{not json");
        assert!(matches!(&events[..], [Err(Error::Json(_))]));
    }

    #[test]
    fn parses_full_response() {
        let body = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "El dolo es…"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.content, "El dolo es…");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().completion_tokens, 4);
    }
}
