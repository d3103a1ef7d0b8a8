use std::sync::Arc;
use std::time::Duration;

use portal_chat_core::delivery::{CannedReply, ReplyState};
use portal_chat_core::kv::{FileStore, KeyValueStore, MemoryStore};
use portal_chat_core::session::{codec, Role};
use portal_chat_core::{ChatService, ChatSessionManager, ChatSettings, DeliveryTiming};

const LIBRARY_REPLY: &str = "The central library is open from 8am to 10pm on weekdays and 9am to 6pm on Saturdays. It is closed on Sundays, holidays.";

fn timing() -> DeliveryTiming {
    DeliveryTiming {
        reply_delay: Duration::from_millis(1000),
        tick_interval: Duration::from_millis(10),
    }
}

fn service_over(kv: Arc<dyn KeyValueStore>, reply: &str) -> ChatService {
    let manager = ChatSessionManager::builder(kv)
        .reply_source(Arc::new(CannedReply::new(reply)))
        .build();
    ChatService::new(manager, timing())
}

#[test]
fn library_hours_scenario_completes_after_one_tick_per_char() {
    assert_eq!(LIBRARY_REPLY.chars().count(), 120);

    let mut manager = ChatSessionManager::builder(Arc::new(MemoryStore::new()))
        .reply_source(Arc::new(CannedReply::new(LIBRARY_REPLY)))
        .build();

    let receipt = manager.send_user_message("What are the library hours?").unwrap();
    let session = manager.session(&receipt.session_id).unwrap();
    assert_eq!(session.title, "What are the library hours?");
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].role, Role::User);

    let generation = manager.begin_assistant_reply(&receipt.session_id).unwrap();
    manager.start_reply(generation);
    let mut last = None;
    for _ in 0..120 {
        last = manager.tick(generation);
    }
    assert_eq!(last, Some(ReplyState::Completed));

    let session = manager.session(&receipt.session_id).unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].role, Role::Assistant);
    assert_eq!(session.messages[1].content.chars().count(), 120);
    assert_eq!(manager.reply_status().unwrap().state, ReplyState::Completed);
}

#[tokio::test(start_paused = true)]
async fn superseding_reply_leaves_one_timer_and_freezes_the_first() {
    let service = service_over(Arc::new(MemoryStore::new()), LIBRARY_REPLY);

    let first = service.send_user_message("Library hours?").unwrap();
    tokio::time::sleep(Duration::from_millis(1055)).await;
    let frozen = service.with_manager(|m| m.session(&first.session_id).unwrap().messages[1].content.clone());
    assert_eq!(frozen.chars().count(), 5);

    service.start_new_session();
    let second = service.send_user_message("Exam schedule?").unwrap();
    assert_eq!(service.active_timers(), 1);

    tokio::time::sleep(Duration::from_millis(3000)).await;
    service.with_manager(|m| {
        assert_eq!(m.session(&first.session_id).unwrap().messages[1].content, frozen);
        let second = m.session(&second.session_id).unwrap();
        assert_eq!(second.messages[1].content, LIBRARY_REPLY);
    });
    assert_eq!(service.active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn reply_keeps_typing_while_another_session_is_open() {
    let service = service_over(Arc::new(MemoryStore::new()), "Forms are at the admin block.");
    let older = service.send_user_message("Where do I get forms?").unwrap();
    tokio::time::sleep(Duration::from_millis(3000)).await;

    service.start_new_session();
    let newer = service.send_user_message("Scholarship forms?").unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;

    let rx = service.subscribe();
    assert!(service.load_session(&older.session_id).is_some());
    assert!(!rx.borrow().is_streaming);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    let view = rx.borrow().clone();
    assert_eq!(view.active_session_id.as_deref(), Some(older.session_id.as_str()));
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.sessions[0].id, newer.session_id);

    service.with_manager(|m| {
        let newer = m.session(&newer.session_id).unwrap();
        assert_eq!(newer.messages[1].content, "Forms are at the admin block.");
    });
}

#[test]
fn two_sessions_started_back_to_back() {
    let service_kv = Arc::new(MemoryStore::new());
    let mut manager = ChatSessionManager::new(service_kv);

    let a = manager.send_user_message("Message A").unwrap();
    manager.start_new_session();
    let b = manager.send_user_message("Message B").unwrap();

    let sessions: Vec<_> = manager.list_sessions().collect();
    assert_eq!(sessions.len(), 2);
    assert_ne!(a.session_id, b.session_id);
    let a_session = manager.session(&a.session_id).unwrap();
    let b_session = manager.session(&b.session_id).unwrap();
    assert_eq!(a_session.messages.len(), 1);
    assert_eq!(b_session.messages.len(), 1);
    assert!(b_session.last_modified > a_session.last_modified);
}

#[test]
fn stale_session_reference_returns_nothing() {
    let mut manager = ChatSessionManager::new(Arc::new(MemoryStore::new()));
    assert!(manager.load_session("nonexistent").is_none());
    assert!(manager.active_session_id().is_none());
}

#[test]
fn file_store_survives_restart_and_upgrades_legacy_payload() {
    let temp = tempfile::TempDir::new().unwrap();
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(temp.path()));
    kv.set(
        "chatHistory",
        r#"[{"id":"1700000000000","title":"Bus timings?","timestamp":1700000002000,
            "messages":[{"id":"1700000000000","role":"user","content":"Bus timings?"},
                        {"id":"1700000001001","role":"ai","content":"Every 20 minutes."}]}]"#,
    )
    .unwrap();

    let mut manager = ChatSessionManager::builder(kv.clone())
        .settings(ChatSettings::default())
        .build();
    let messages = manager.load_session("1700000000000").unwrap().to_vec();
    assert_eq!(messages[1].role, Role::Assistant);

    manager.send_user_message("And on Sundays?").unwrap();

    let raw = kv.get("chatHistory").unwrap().unwrap();
    assert!(raw.starts_with(r#"{"version":1"#));
    let stored = codec::decode(&raw).unwrap();
    assert_eq!(stored.get("1700000000000").unwrap().messages.len(), 3);

    let reloaded = ChatSessionManager::new(kv);
    let summaries: Vec<_> = reloaded.list_sessions().collect();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].title, "Bus timings?");
}

#[test]
fn store_round_trips_through_codec() {
    let mut manager = ChatSessionManager::builder(Arc::new(MemoryStore::new()))
        .reply_source(Arc::new(CannedReply::new("Yes.")))
        .build();
    for question in ["Is the lab open?", "Who is the dean?"] {
        manager.start_new_session();
        let receipt = manager.send_user_message(question).unwrap();
        let generation = manager.begin_assistant_reply(&receipt.session_id).unwrap();
        manager.start_reply(generation);
        while manager.tick(generation) == Some(ReplyState::Streaming) {}
    }

    let ids: Vec<String> = manager.list_sessions().map(|s| s.id).collect();
    let mut sessions = Vec::new();
    for id in &ids {
        sessions.push(manager.session(id).unwrap().clone());
    }
    let store = portal_chat_core::session::SessionStore::from_sessions(sessions.clone());

    let decoded = codec::decode(&codec::encode(&store).unwrap()).unwrap();
    let restored: Vec<_> = decoded.iter_recent().cloned().collect();
    assert_eq!(restored, sessions);
}
