//! PostgREST backend against an in-process stand-in for Supabase REST.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use lt_conversations::{ConversationStore, PostgrestStore};
use lt_domain::config::PostgrestConfig;
use lt_domain::message::{ChatMessage, Role};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Clone, Default)]
struct Tables {
    rows: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    failures_left: Arc<Mutex<u32>>,
}

fn eq_filter(params: &HashMap<String, String>) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(k, v)| v.strip_prefix("eq.").map(|v| (k.clone(), v.to_string())))
        .collect()
}

fn matches(row: &Value, filters: &[(String, String)]) -> bool {
    filters
        .iter()
        .all(|(k, v)| row.get(k).and_then(|x| x.as_str()) == Some(v.as_str()))
}

async fn select(
    State(t): State<Tables>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let filters = eq_filter(&params);
    let rows = t.rows.lock();
    let mut out: Vec<Value> = rows
        .get(&table)
        .map(|r| r.iter().filter(|row| matches(row, &filters)).cloned().collect())
        .unwrap_or_default();
    if params.get("order").map(String::as_str) == Some("created_at.desc") {
        out.reverse();
    }
    Json(out)
}

async fn insert(
    State(t): State<Tables>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Vec<Value>>,
) -> impl IntoResponse {
    assert_eq!(headers.get("apikey").unwrap(), "service-key");
    {
        let mut left = t.failures_left.lock();
        if *left > 0 {
            *left -= 1;
            return StatusCode::BAD_GATEWAY;
        }
    }
    let ignore_dupes = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("resolution=ignore-duplicates"));
    let mut rows = t.rows.lock();
    let table_rows = rows.entry(table).or_default();
    for row in body {
        let exists = table_rows.iter().any(|r| r["id"] == row["id"]);
        if exists && !ignore_dupes {
            return StatusCode::CONFLICT;
        }
        if !exists {
            table_rows.push(row);
        }
    }
    StatusCode::CREATED
}

async fn remove(
    State(t): State<Tables>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let filters = eq_filter(&params);
    let mut rows = t.rows.lock();
    let table_rows = rows.entry(table).or_default();
    let (gone, keep): (Vec<Value>, Vec<Value>) =
        table_rows.drain(..).partition(|r| matches(r, &filters));
    *table_rows = keep;
    Json(gone)
}

async fn start(tables: Tables) -> SocketAddr {
    let app = Router::new()
        .route("/rest/v1/:table", get(select).post(insert).delete(remove))
        .with_state(tables);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn store(addr: SocketAddr) -> PostgrestStore {
    PostgrestStore::new(
        &format!("http://{addr}"),
        "service-key".into(),
        &PostgrestConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn append_creates_conversation_and_lists_in_order() {
    let tables = Tables::default();
    let s = store(start(tables.clone()).await);
    let cid = Uuid::new_v4();

    s.append(ChatMessage::new("u1", Some(cid), Role::User, "¿Qué es el dolo?"))
        .await
        .unwrap();
    s.append(ChatMessage::new("u1", Some(cid), Role::Assistant, "Pregunta socrática…"))
        .await
        .unwrap();

    let msgs = s.list_by_conversation("u1", cid).await.unwrap();
    let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert!(msgs[0].created_at < msgs[1].created_at);

    let conv = s.get_conversation(cid).await.unwrap().unwrap();
    assert_eq!(conv.title, "¿Qué es el dolo?");
    assert_eq!(s.list_conversations("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn retried_append_is_idempotent() {
    let tables = Tables::default();
    let s = store(start(tables.clone()).await);

    let msg = ChatMessage::new("u1", None, Role::User, "hola");
    s.append(msg.clone()).await.unwrap();
    s.append(msg).await.unwrap();
    assert_eq!(s.list_by_user("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn transient_errors_are_retried() {
    let tables = Tables::default();
    *tables.failures_left.lock() = 2;
    let s = store(start(tables.clone()).await);

    s.append(ChatMessage::new("u1", None, Role::User, "hola"))
        .await
        .unwrap();
    assert_eq!(s.list_by_user("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_only_touches_own_conversation() {
    let tables = Tables::default();
    let s = store(start(tables.clone()).await);
    let conv = s.create_conversation("u1", None).await.unwrap();
    s.append(ChatMessage::new("u1", Some(conv.id), Role::User, "hola"))
        .await
        .unwrap();

    assert!(!s.delete_conversation("u2", conv.id).await.unwrap());
    assert!(s.delete_conversation("u1", conv.id).await.unwrap());
    assert!(s.get_conversation(conv.id).await.unwrap().is_none());
    assert!(s.list_by_user("u1").await.unwrap().is_empty());
}
