mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::*;
use lt_conversations::ConversationStore;

#[tokio::test]
async fn health_is_public() {
    let h = HarnessBuilder::new().build();
    let (status, _, body) = h.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let v = json(&body);
    assert_eq!(v["status"], "ok");
    assert_eq!(v["store"], "memory");
    assert_eq!(v["search"], false);
    assert_eq!(v["transcription"], false);
}

#[tokio::test]
async fn new_chat_then_history() {
    let h = HarnessBuilder::new().build();

    let (status, _, body) = h
        .post_json("/conversations", Some(&ana()), json!({ "title": "Penal I" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let conv = json(&body);
    assert_eq!(conv["title"], "Penal I");
    let cid: Uuid = conv["id"].as_str().unwrap().parse().unwrap();

    let (status, _, _) = h
        .post_json(
            "/chat",
            Some(&ana()),
            json!({ "message": "¿Qué es el dolo?", "conversationId": cid, "stream": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = h
        .get(&format!("/messages?conversationId={cid}"), Some(&ana()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json(&body),
        json!([
            { "role": "user", "content": "¿Qué es el dolo?" },
            { "role": "assistant", "content": h.llm.reply },
        ])
    );

    let (_, _, body) = h.get("/conversations", Some(&ana())).await;
    let list = json(&body);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], cid.to_string());
}

#[tokio::test]
async fn messages_without_conversation_lists_everything_for_user() {
    let h = HarnessBuilder::new().build();
    h.post_json("/chat", Some(&ana()), json!({ "message": "uno", "stream": false }))
        .await;
    h.post_json("/chat", Some(&luis()), json!({ "message": "dos", "stream": false }))
        .await;

    let (_, _, body) = h.get("/messages", Some(&ana())).await;
    let msgs = json(&body);
    assert_eq!(msgs.as_array().unwrap().len(), 2);
    assert_eq!(msgs[0]["content"], "uno");
}

#[tokio::test]
async fn other_users_conversation_is_hidden() {
    let h = HarnessBuilder::new().build();
    let conv = h.store.create_conversation("luis-id", None).await.unwrap();

    let (status, _, _) = h
        .get(&format!("/messages?conversationId={}", conv.id), Some(&ana()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = Request::delete(format!("/conversations/{}", conv.id))
        .header("authorization", "Bearer ana-id")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = h.send(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.store.get_conversation(conv.id).await.unwrap().is_some());
}

#[tokio::test]
async fn delete_own_conversation() {
    let h = HarnessBuilder::new().build();
    let conv = h.store.create_conversation("ana-id", None).await.unwrap();

    let req = Request::delete(format!("/conversations/{}", conv.id))
        .header("authorization", "Bearer ana-id")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = h.send(req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(h.store.get_conversation(conv.id).await.unwrap().is_none());
}

#[tokio::test]
async fn history_routes_require_session() {
    let h = HarnessBuilder::new().build();
    for path in ["/messages", "/conversations"] {
        let (status, _, _) = h.get(path, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
    }
}
