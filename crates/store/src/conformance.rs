//! Behavior every backend must share, run from each backend's tests.

use parley_core::{ConversationId, Message, MessageStore, StoreError, ToolCall, UserProfile};
use serde_json::json;

fn user(id: &str) -> UserProfile {
    UserProfile::new(id, format!("User {id}"))
}

pub async fn conversation_per_user(store: &dyn MessageStore) {
    let a = store.get_or_create(&user("1")).await.unwrap();
    let again = store.get_or_create(&user("1")).await.unwrap();
    let b = store.get_or_create(&user("2")).await.unwrap();

    assert_eq!(a, again);
    assert_ne!(a, b);
    assert!(store.recent(&a, 20).await.unwrap().is_empty());
}

pub async fn recent_window_keeps_latest(store: &dyn MessageStore) {
    let id = store.get_or_create(&user("1")).await.unwrap();
    let messages: Vec<Message> = (0..25).map(|i| Message::user(format!("m{i}"))).collect();
    store.append(&id, &messages).await.unwrap();

    let recent = store.recent(&id, 20).await.unwrap();
    assert_eq!(recent.len(), 20);
    assert_eq!(recent[0].content(), Some("m5"));
    assert_eq!(recent[19].content(), Some("m24"));
}

pub async fn clear_round_trip(store: &dyn MessageStore) {
    let id = store.get_or_create(&user("1")).await.unwrap();
    store
        .append(&id, &[Message::user("hi"), Message::assistant("<p>hello</p>")])
        .await
        .unwrap();
    let before = store.last_updated(&id).await.unwrap();
    assert!(before.is_some());

    store.clear(&id).await.unwrap();
    assert!(store.recent(&id, 20).await.unwrap().is_empty());
    assert!(store.last_updated(&id).await.unwrap() >= before);

    // Empty append is a no-op
    store.append(&id, &[]).await.unwrap();
    assert!(store.recent(&id, 20).await.unwrap().is_empty());
}

pub async fn append_preserves_message_shapes(store: &dyn MessageStore) {
    let id = store.get_or_create(&user("1")).await.unwrap();
    let call = ToolCall::new(
        Some("call_1".into()),
        "search_network",
        json!({"query": "jazz"}).as_object().cloned().unwrap_or_default(),
    );
    let sequence = vec![
        Message::user("find jazz"),
        Message::tool_request(vec![call.clone()]),
        Message::tool_result("call_1", r#"{"success":true}"#),
        Message::assistant("<p>Found it</p>"),
    ];
    store.append(&id, &sequence[..2]).await.unwrap();
    store.append(&id, &sequence[2..]).await.unwrap();

    let stored = store.recent(&id, 20).await.unwrap();
    assert_eq!(stored, sequence);
    assert_eq!(stored[1].tool_calls(), &[call]);
}

pub async fn unknown_conversation_is_an_error(store: &dyn MessageStore) {
    let missing = ConversationId::from("does-not-exist");
    let err = store.append(&missing, &[Message::user("x")]).await.unwrap_err();
    assert!(matches!(err, StoreError::ConversationNotFound(_)));
    assert!(store.recent(&missing, 5).await.is_err());
}
