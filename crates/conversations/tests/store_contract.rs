//! Behaviour every `ConversationStore` backend must share.

use std::sync::Arc;

use lt_conversations::{ConversationStore, JsonlStore, MemoryStore};
use lt_domain::message::{ChatMessage, Role, DEFAULT_TITLE};
use uuid::Uuid;

async fn backends(dir: &tempfile::TempDir) -> Vec<Arc<dyn ConversationStore>> {
    vec![
        Arc::new(MemoryStore::new()),
        Arc::new(JsonlStore::open(dir.path()).unwrap()),
    ]
}

#[tokio::test]
async fn turn_round_trip_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let cid = Uuid::new_v4();
        let user = ChatMessage::new("ana", Some(cid), Role::User, "Explícame la legítima defensa");
        // Same stamp on purpose: the store must still order them.
        let mut reply = ChatMessage::new("ana", Some(cid), Role::Assistant, "¿Qué crees que exige?");
        reply.created_at = user.created_at;

        store.append(user).await.unwrap();
        store.append(reply).await.unwrap();

        let msgs = store.list_by_conversation("ana", cid).await.unwrap();
        assert_eq!(msgs.len(), 2, "{}", store.backend_name());
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert!(msgs[0].created_at < msgs[1].created_at);

        let conv = store.get_conversation(cid).await.unwrap().unwrap();
        assert_eq!(conv.user_id, "ana");
        assert_eq!(conv.title, "Explícame la legítima defensa");
    }
}

#[tokio::test]
async fn append_is_idempotent_by_id() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let msg = ChatMessage::new("ana", None, Role::User, "hola");
        let first = store.append(msg.clone()).await.unwrap();
        let second = store.append(msg).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.list_by_user("ana").await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn foreign_conversation_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let conv = store.create_conversation("ana", None).await.unwrap();
        assert_eq!(conv.title, DEFAULT_TITLE);

        let intruder = ChatMessage::new("luis", Some(conv.id), Role::User, "hola");
        assert!(store.append(intruder).await.is_err());
        assert!(store.list_by_user("luis").await.unwrap().is_empty());
        assert!(store.list_by_conversation("luis", conv.id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn users_do_not_see_each_other() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        store
            .append(ChatMessage::new("ana", None, Role::User, "uno"))
            .await
            .unwrap();
        store
            .append(ChatMessage::new("luis", None, Role::User, "dos"))
            .await
            .unwrap();

        let ana = store.list_by_user("ana").await.unwrap();
        assert_eq!(ana.len(), 1);
        assert_eq!(ana[0].content, "uno");
    }
}

#[tokio::test]
async fn conversations_listed_newest_activity_first() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let a = store.create_conversation("ana", Some("Penal".into())).await.unwrap();
        let b = store.create_conversation("ana", Some("Civil".into())).await.unwrap();
        store
            .append(ChatMessage::new("ana", Some(a.id), Role::User, "más reciente"))
            .await
            .unwrap();

        let list = store.list_conversations("ana").await.unwrap();
        let ids: Vec<Uuid> = list.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id, b.id], "{}", store.backend_name());
    }
}

#[tokio::test]
async fn delete_removes_messages_for_owner_only() {
    let dir = tempfile::tempdir().unwrap();
    for store in backends(&dir).await {
        let conv = store.create_conversation("ana", None).await.unwrap();
        store
            .append(ChatMessage::new("ana", Some(conv.id), Role::User, "hola"))
            .await
            .unwrap();

        assert!(!store.delete_conversation("luis", conv.id).await.unwrap());
        assert!(store.delete_conversation("ana", conv.id).await.unwrap());
        assert!(store.get_conversation(conv.id).await.unwrap().is_none());
        assert!(store.list_by_conversation("ana", conv.id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn jsonl_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let cid = Uuid::new_v4();
    {
        let store = JsonlStore::open(dir.path()).unwrap();
        store
            .append(ChatMessage::new("ana", Some(cid), Role::User, "primera"))
            .await
            .unwrap();
        store
            .append(ChatMessage::new("ana", Some(cid), Role::Assistant, "respuesta"))
            .await
            .unwrap();
    }

    let store = JsonlStore::open(dir.path()).unwrap();
    let msgs = store.list_by_conversation("ana", cid).await.unwrap();
    let contents: Vec<&str> = msgs.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["primera", "respuesta"]);
    assert_eq!(store.list_conversations("ana").await.unwrap().len(), 1);

    // A fresh append after reopen still sorts after the loaded history.
    let mut late = ChatMessage::new("ana", Some(cid), Role::User, "otra");
    late.created_at = msgs[0].created_at;
    let stored = store.append(late).await.unwrap();
    assert!(stored.created_at > msgs[1].created_at);
}
