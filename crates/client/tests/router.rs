mod common;

use chatify_client::stores::PendingStatus;
use chatify_client::ws::Dispatch;
use chatify_client::NoticeLevel;
use chatify_shared::{Conversation, ServerFrame};
use common::{frame, ids, message, participant, FakeApi, Harness};

/// Session with two known conversations and `c1` open.
async fn with_c1_open() -> Harness {
    let api = FakeApi::with_conversations(
        vec![
            Conversation::new("c1", participant("u2", "Bob")),
            Conversation::new("c2", participant("u3", "Carol")),
        ],
        None,
    );
    api.set_page("c1", 1, &[message("m1", "c1", 1)]);
    let h = Harness::new(api, []);
    h.session
        .conversations()
        .fetch_snapshot(h.api.as_ref(), h.session.presence(), h.session.notices())
        .await;
    h.session.select_conversation(Some("c1".into())).await;
    h
}

fn ack(request_id: &str, message: chatify_shared::Message) -> ServerFrame {
    ServerFrame::Acknowledged {
        id: request_id.into(),
        message,
    }
}

#[tokio::test]
async fn message_for_open_conversation_is_appended() {
    let h = with_c1_open().await;

    let dispatch = h.session.router().route(ServerFrame::Msg {
        id: Some("x".into()),
        message: message("m2", "c1", 2),
    });

    assert_eq!(dispatch, Dispatch::MessageAppended("m2".into()));
    assert_eq!(ids(&h.session.messages().messages()), vec!["m1", "m2"]);
    let c1 = h.session.conversations().get("c1").unwrap();
    assert_eq!(c1.last_message.unwrap().id, "m2");
    assert!(h.notices_at(NoticeLevel::NewMessage).is_empty());
}

#[tokio::test]
async fn message_for_other_conversation_only_notifies() {
    let h = with_c1_open().await;
    let visible = h.session.messages().messages();

    let dispatch = h.session.router().route(ServerFrame::Msg {
        id: None,
        message: message("m9", "c2", 9),
    });

    assert_eq!(dispatch, Dispatch::MessageNotified("m9".into()));
    assert_eq!(h.session.messages().messages(), visible);
    let c2 = h.session.conversations().get("c2").unwrap();
    assert_eq!(c2.last_message.unwrap().id, "m9");
    assert_eq!(
        h.notices_at(NoticeLevel::NewMessage),
        vec!["New message from: Carol"]
    );
    // c2 now has the newest message.
    assert_eq!(h.session.conversations().conversations()[0].id, "c2");
}

#[tokio::test]
async fn message_for_unlisted_conversation_raises_no_notice() {
    let h = with_c1_open().await;

    let dispatch = h.session.router().route(ServerFrame::Msg {
        id: None,
        message: message("m9", "c9", 9),
    });

    assert_eq!(dispatch, Dispatch::MessageUnlisted("m9".into()));
    assert!(h.notices_at(NoticeLevel::NewMessage).is_empty());
    assert_eq!(ids(&h.session.messages().messages()), vec!["m1"]);
    assert!(h.session.conversations().get("c9").is_none());
}

#[tokio::test]
async fn new_message_notice_respects_preference() {
    let h = with_c1_open().await;
    h.session.notices().set_values(Some(false), None);

    h.session.router().route(ServerFrame::Msg {
        id: None,
        message: message("m9", "c2", 9),
    });

    assert!(h.notices_at(NoticeLevel::NewMessage).is_empty());
    assert_eq!(
        h.session.conversations().get("c2").unwrap().last_message.unwrap().id,
        "m9"
    );
}

#[tokio::test]
async fn send_then_ack_leaves_one_message_and_no_pending() {
    let h = with_c1_open().await;

    let request_id = h.session.send_message("  hello  ", None).unwrap();
    let pending = h.session.messages().pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].text, "hello");
    assert_eq!(pending[0].status, PendingStatus::Sending);

    let mut confirmed = message("m2", "c1", 2);
    confirmed.text = "hello".into();
    let dispatch = h
        .session
        .router()
        .handle_text(&frame(&ack(&request_id, confirmed)));

    assert_eq!(dispatch, Dispatch::Acknowledged(request_id));
    assert!(h.session.messages().all_pending().is_empty());
    let history = h.session.messages().messages();
    assert_eq!(history.iter().filter(|m| m.text == "hello").count(), 1);
    assert_eq!(ids(&history), vec!["m1", "m2"]);
    assert_eq!(
        h.session.conversations().get("c1").unwrap().last_message.unwrap().id,
        "m2"
    );
}

#[tokio::test]
async fn ack_removes_exactly_one_pending_entry() {
    let h = with_c1_open().await;
    let first = h.session.send_message("one", None).unwrap();
    let second = h.session.send_message("two", None).unwrap();
    assert_ne!(first, second);

    h.session.router().route(ack(&first, message("m2", "c1", 2)));
    let left: Vec<_> = h
        .session
        .messages()
        .pending()
        .into_iter()
        .map(|p| p.request_id)
        .collect();
    assert_eq!(left, vec![second.clone()]);

    // A repeated acknowledgment matches nothing and changes nothing.
    let repeated = h.session.router().route(ack(&first, message("m2", "c1", 2)));
    assert_eq!(repeated, Dispatch::UnmatchedAck(first));
    assert_eq!(h.session.messages().pending().len(), 1);
    assert_eq!(ids(&h.session.messages().messages()), vec!["m1", "m2"]);
}

#[tokio::test]
async fn ack_for_conversation_left_behind_updates_summary_only() {
    let h = with_c1_open().await;
    let request_id = h.session.send_message("for bob", None).unwrap();
    h.api.set_page("c2", 1, &[]);
    h.session.select_conversation(Some("c2".into())).await;
    assert!(h.session.messages().pending().is_empty());
    assert_eq!(h.session.messages().all_pending().len(), 1);

    h.session
        .router()
        .route(ack(&request_id, message("m5", "c1", 5)));

    assert!(h.session.messages().all_pending().is_empty());
    assert!(h.session.messages().is_empty());
    assert_eq!(
        h.session.conversations().get("c1").unwrap().last_message.unwrap().id,
        "m5"
    );
}

#[tokio::test]
async fn sending_needs_a_selection_and_text() {
    let h = Harness::new(FakeApi::default(), []);
    assert!(h.session.send_message("hello", None).is_none());

    let h = with_c1_open().await;
    assert!(h.session.send_message("   ", None).is_none());
    assert!(h
        .session
        .send_message("", Some("https://img.test/cat.png".into()))
        .is_some());
}

#[tokio::test]
async fn send_while_disconnected_keeps_pending_entry() {
    let h = with_c1_open().await;
    assert!(!h.session.connection().state().is_open());

    let request_id = h.session.send_message("offline", None).unwrap();

    assert_eq!(h.session.messages().pending()[0].request_id, request_id);
    assert_eq!(h.connector.attempts(), 0);
}

#[tokio::test]
async fn stale_pending_sends_are_marked_failed() {
    let h = Harness::build(
        FakeApi::with_conversations(vec![Conversation::new("c1", participant("u2", "Bob"))], None),
        [],
        common::signed_in(),
        |config| config.pending_timeout = Some(std::time::Duration::ZERO),
    );
    h.session.select_conversation(Some("c1".into())).await;
    let request_id = h.session.send_message("lost", None).unwrap();

    assert_eq!(h.session.sweep_pending(), vec![request_id.clone()]);
    assert_eq!(h.session.messages().pending()[0].status, PendingStatus::Failed);
    assert_eq!(
        h.notices_at(NoticeLevel::Warning),
        vec!["A message could not be delivered."]
    );
    assert!(h.session.sweep_pending().is_empty());

    // A late acknowledgment still reconciles the failed entry.
    let dispatch = h.session.router().route(ack(&request_id, message("m1", "c1", 1)));
    assert_eq!(dispatch, Dispatch::Acknowledged(request_id));
    assert!(h.session.messages().all_pending().is_empty());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let h = with_c1_open().await;
    let delete = ServerFrame::Delete {
        message_id: "m1".into(),
    };

    assert_eq!(
        h.session.router().route(delete.clone()),
        Dispatch::MessageDeleted("m1".into())
    );
    assert!(h.session.messages().is_empty());
    assert_eq!(
        h.session.router().route(delete),
        Dispatch::MessageDeleted("m1".into())
    );
    assert!(h.session.messages().is_empty());
}

#[tokio::test]
async fn status_frames_drive_presence() {
    let h = with_c1_open().await;
    let router = h.session.router();

    router.handle_text(r#"{"type":"status","userId":"u2","online":true}"#);
    assert!(h.session.presence().is_online("u2"));

    router.handle_text(r#"{"type":"status","userId":"u2","online":false}"#);
    assert!(!h.session.presence().is_online("u2"));

    // Removing an absent id is a no-op.
    router.handle_text(r#"{"type":"status","userId":"u2","online":false}"#);
    assert!(h.session.presence().is_empty());
}

#[tokio::test]
async fn announced_conversation_is_prepended_with_presence() {
    let h = with_c1_open().await;
    let router = h.session.router();

    let dispatch = router.handle_text(
        r#"{"type":"cnv","cnvId":"c3","user":{"_id":"u4","name":"Dan"},"isOnline":true}"#,
    );

    assert_eq!(dispatch, Dispatch::ConversationAdded("c3".into()));
    assert_eq!(h.session.conversations().len(), 3);
    assert!(h.session.presence().is_online("u4"));

    // Same participant again is ignored.
    router.handle_text(r#"{"type":"cnv","cnvId":"c4","user":{"_id":"u4","name":"Dan"}}"#);
    assert_eq!(h.session.conversations().len(), 3);
    assert!(h.session.conversations().get("c4").is_none());
}

#[tokio::test]
async fn error_frames_only_notify() {
    let h = with_c1_open().await;
    let before = h.session.messages().messages();

    let dispatch = h
        .session
        .router()
        .handle_text(r#"{"type":"err","message":"Conversation not found"}"#);

    assert_eq!(dispatch, Dispatch::ErrorShown);
    assert_eq!(h.notices_at(NoticeLevel::Error), vec!["Conversation not found"]);
    assert_eq!(h.session.messages().messages(), before);
}

#[tokio::test]
async fn unknown_and_malformed_frames_are_ignored() {
    let h = with_c1_open().await;
    let router = h.session.router();
    let before = h.session.messages().messages();

    assert_eq!(router.handle_text(r#"{"type":"typing","userId":"u2"}"#), Dispatch::Ignored);
    assert_eq!(router.handle_text(r#"{"type":"msg"}"#), Dispatch::Ignored);
    assert_eq!(router.handle_text("not json"), Dispatch::Ignored);

    assert_eq!(h.session.messages().messages(), before);
    assert!(h.notices.lock().is_empty());
}
