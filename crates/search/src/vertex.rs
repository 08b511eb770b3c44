//! Vertex AI Search (Discovery Engine) implementation of [`DocumentSearch`].
//!
//! Wraps a `reqwest::Client` and issues one `:search` call per query, with
//! retry and exponential back-off on transient (5xx / timeout) failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lt_domain::config::SearchConfig;
use lt_domain::error::{Error, Result};
use lt_domain::retry::backoff;
use lt_domain::trace::TraceEvent;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use uuid::Uuid;

use crate::auth::GoogleTokenSource;
use crate::context::PassageExtractor;
use crate::provider::DocumentSearch;
use crate::types::{Passage, SearchRequest, SearchResponse};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Created once at startup and shared by every turn. The underlying
/// `reqwest::Client` keeps a connection pool.
#[derive(Debug, Clone)]
pub struct VertexSearchClient {
    http: Client,
    endpoint: String,
    page_size: u32,
    max_retries: u32,
    tokens: Arc<GoogleTokenSource>,
    extractor: PassageExtractor,
}

impl VertexSearchClient {
    pub fn new(cfg: &SearchConfig, tokens: GoogleTokenSource) -> Result<Self> {
        let (Some(project), Some(engine)) = (&cfg.project_id, &cfg.engine_id) else {
            return Err(Error::Config(
                "search.project_id and search.engine_id are required".into(),
            ));
        };

        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        let endpoint = format!(
            "{}/projects/{}/locations/{}/collections/{}/{}/{}/servingConfigs/{}:search",
            cfg.api_base.trim_end_matches('/'),
            project,
            cfg.location,
            cfg.collection,
            cfg.target.path_segment(),
            engine,
            cfg.serving_config,
        );

        Ok(Self {
            http,
            endpoint,
            page_size: cfg.page_size,
            max_retries: cfg.max_retries,
            tokens: Arc::new(tokens),
            extractor: PassageExtractor::new(cfg.max_passages)?,
        })
    }

    /// The fully-qualified `:search` URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off.
    ///
    /// * Retries on 5xx status codes and on transport errors.
    /// * Does **not** retry on 4xx; 401/403 map to [`Error::Auth`].
    /// * Emits a `TraceEvent::SearchCall` after every attempt.
    async fn execute_with_retry(&self, build_request: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(100, attempt)).await;
            }

            let start = Instant::now();
            let result = build_request()
                .header("X-Request-Id", Uuid::new_v4().to_string())
                .send()
                .await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::SearchCall {
                        endpoint: "servingConfigs:search".into(),
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Search(format!("search returned {status}: {body}")));
                        continue;
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::Auth(format!("search auth failed ({status}): {body}")));
                    }
                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::Search(format!("search returned {status}: {body}")));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::SearchCall {
                        endpoint: "servingConfigs:search".into(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    tracing::warn!(attempt, error = %e, "search request failed");
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Search("retries exhausted".into())))
    }
}

#[async_trait]
impl DocumentSearch for VertexSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<Passage>> {
        let token = self.tokens.token().await?;
        let req = SearchRequest::new(query, self.page_size);

        tracing::debug!(query_chars = query.chars().count(), "vertex search");

        let resp = self
            .execute_with_retry(|| self.http.post(&self.endpoint).bearer_auth(&token).json(&req))
            .await?;

        let body = resp.text().await.map_err(from_reqwest)?;
        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Search(format!("failed to parse search response: {e}")))?;

        let passages = self.extractor.extract(&parsed);
        tracing::debug!(
            results = parsed.results.len(),
            passages = passages.len(),
            "vertex search done"
        );
        Ok(passages)
    }
}
