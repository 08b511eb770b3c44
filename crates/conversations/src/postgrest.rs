//! Supabase (PostgREST) implementation of [`ConversationStore`].
//!
//! Expected tables:
//!
//! ```text
//! conversations(id uuid pk, user_id text, title text, created_at timestamptz)
//! messages(id uuid pk, conversation_id uuid null, user_id text,
//!          role text, content text, created_at timestamptz)
//! ```
//!
//! Requests use the service-role key and are retried with exponential
//! back-off on 5xx and transport failures. Message inserts send
//! `Prefer: resolution=ignore-duplicates`, which makes a retried append
//! with the same id a no-op.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lt_domain::config::PostgrestConfig;
use lt_domain::error::{Error, Result};
use lt_domain::message::{title_from_message, ChatMessage, Conversation, Role, DEFAULT_TITLE};
use lt_domain::retry::backoff;
use lt_domain::trace::TraceEvent;
use parking_lot::Mutex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::next_stamp;
use crate::store::ConversationStore;

#[derive(Debug, Serialize, Deserialize)]
struct ConversationRow {
    id: Uuid,
    user_id: String,
    title: String,
    created_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.created_at,
        }
    }
}

pub struct PostgrestStore {
    http: Client,
    rest_url: String,
    key: String,
    messages_table: String,
    conversations_table: String,
    max_retries: u32,
    /// Last stamp handed out per conversation key, for monotonic ordering
    /// across appends from this process.
    last_stamp: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl PostgrestStore {
    pub fn new(base_url: &str, key: String, cfg: &PostgrestConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            key,
            messages_table: cfg.messages_table.clone(),
            conversations_table: cfg.conversations_table.clone(),
            max_retries: cfg.max_retries,
            last_stamp: Mutex::new(HashMap::new()),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{}", self.rest_url, name)
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("apikey", &self.key).bearer_auth(&self.key)
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Retries on 5xx and transport errors; 4xx is permanent.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(100, attempt)).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    tracing::debug!(endpoint, status = status.as_u16(), duration_ms, "postgrest call");

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::Store(format!("{endpoint} returned {status}: {body}")));
                        continue;
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::Auth(format!("{endpoint} auth failed ({status}): {body}")));
                    }
                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::Store(format!("{endpoint} returned {status}: {body}")));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    tracing::warn!(endpoint, attempt, error = %e, "postgrest request failed");
                    last_err = Some(if e.is_timeout() {
                        Error::Timeout(e.to_string())
                    } else {
                        Error::Http(e.to_string())
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Store(format!("{endpoint}: retries exhausted"))))
    }

    async fn get_rows<T: for<'de> Deserialize<'de>>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = self.table(table);
        let resp = self
            .execute_with_retry(&format!("GET {table}"), || self.http.get(&url).query(query))
            .await?;
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Store(format!("failed to parse {table} rows: {e}")))
    }

    fn stamp(&self, message: &mut ChatMessage) {
        let key = match message.conversation_id {
            Some(id) => id.to_string(),
            None => format!("user:{}", message.user_id),
        };
        let mut last = self.last_stamp.lock();
        let stamped = next_stamp(last.get(&key).copied(), message.created_at);
        message.created_at = stamped;
        last.insert(key, stamped);
    }
}

#[async_trait]
impl ConversationStore for PostgrestStore {
    async fn append(&self, mut message: ChatMessage) -> Result<ChatMessage> {
        if let Some(cid) = message.conversation_id {
            match self.get_conversation(cid).await? {
                Some(c) if c.user_id != message.user_id => {
                    return Err(Error::Store(format!(
                        "conversation {cid} does not belong to the author"
                    )));
                }
                Some(_) => {}
                None => {
                    let title = match message.role {
                        Role::User => title_from_message(&message.content),
                        _ => DEFAULT_TITLE.to_owned(),
                    };
                    let row = ConversationRow {
                        id: cid,
                        user_id: message.user_id.clone(),
                        title,
                        created_at: message.created_at,
                    };
                    let url = self.table(&self.conversations_table);
                    self.execute_with_retry("POST conversations", || {
                        self.http
                            .post(&url)
                            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
                            .json(&[&row])
                    })
                    .await?;
                }
            }
        }

        self.stamp(&mut message);
        let url = self.table(&self.messages_table);
        self.execute_with_retry("POST messages", || {
            self.http
                .post(&url)
                .header("Prefer", "resolution=ignore-duplicates,return=minimal")
                .json(&[&message])
        })
        .await?;

        TraceEvent::MessageAppended {
            conversation_id: message.conversation_id.map(|c| c.to_string()),
            role: message.role.as_str().into(),
            chars: message.content.chars().count(),
        }
        .emit();

        Ok(message)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        self.get_rows(
            &self.messages_table,
            &[
                ("select", "*".into()),
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.asc".into()),
            ],
        )
        .await
    }

    async fn list_by_conversation(
        &self,
        user_id: &str,
        conversation_id: Uuid,
    ) -> Result<Vec<ChatMessage>> {
        self.get_rows(
            &self.messages_table,
            &[
                ("select", "*".into()),
                ("user_id", format!("eq.{user_id}")),
                ("conversation_id", format!("eq.{conversation_id}")),
                ("order", "created_at.asc".into()),
            ],
        )
        .await
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<String>,
    ) -> Result<Conversation> {
        let row = ConversationRow {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            created_at: Utc::now(),
        };
        let url = self.table(&self.conversations_table);
        self.execute_with_retry("POST conversations", || {
            self.http
                .post(&url)
                .header("Prefer", "return=minimal")
                .json(&[&row])
        })
        .await?;
        Ok(row.into())
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        let rows: Vec<ConversationRow> = self
            .get_rows(
                &self.conversations_table,
                &[("select", "*".into()), ("id", format!("eq.{id}"))],
            )
            .await?;
        Ok(rows.into_iter().next().map(Conversation::from))
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let rows: Vec<ConversationRow> = self
            .get_rows(
                &self.conversations_table,
                &[
                    ("select", "*".into()),
                    ("user_id", format!("eq.{user_id}")),
                    ("order", "created_at.desc".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    async fn delete_conversation(&self, user_id: &str, id: Uuid) -> Result<bool> {
        let filters = [("id", format!("eq.{id}")), ("user_id", format!("eq.{user_id}"))];
        let conv_url = self.table(&self.conversations_table);
        let resp = self
            .execute_with_retry("DELETE conversations", || {
                self.http
                    .delete(&conv_url)
                    .header("Prefer", "return=representation")
                    .query(&filters)
            })
            .await?;
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        let deleted: Vec<ConversationRow> = serde_json::from_str(&body).unwrap_or_default();
        if deleted.is_empty() {
            return Ok(false);
        }

        let msg_url = self.table(&self.messages_table);
        let msg_filters = [
            ("conversation_id", format!("eq.{id}")),
            ("user_id", format!("eq.{user_id}")),
        ];
        self.execute_with_retry("DELETE messages", || {
            self.http.delete(&msg_url).query(&msg_filters)
        })
        .await?;
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "postgrest"
    }
}
