//! End-to-end handler scenarios against a real in-memory database, with
//! channel handles backed by plain mpsc pairs standing in for sockets.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use parley_db::Database;
use parley_gateway::dispatcher::Dispatcher;
use parley_gateway::registry::ChannelHandle;
use parley_gateway::{messages, reactions, receipts, signaling};
use parley_types::events::{SendMessagePayload, ServerEvent};
use parley_types::models::MessageStatus;
use parley_types::participant::ParticipantKey;

struct TestClient {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl TestClient {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            conn_id: Uuid::new_v4(),
            tx,
            rx,
        }
    }

    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

fn seeded_dispatcher() -> Dispatcher {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.create_user("alice", "Alice Arden", "alice@example.com", None)
        .unwrap();
    db.create_user("bob", "Bob Breck", "bob@example.com", None)
        .unwrap();
    db.create_user("carol", "Carol Cole", "carol@example.com", None)
        .unwrap();
    db.create_conversation("c1", false, &["alice", "bob"]).unwrap();
    db.create_conversation("g1", true, &["alice", "bob", "carol"])
        .unwrap();
    Dispatcher::new(db)
}

async fn connect(dispatcher: &Dispatcher, user_id: &str) -> TestClient {
    let client = TestClient::new();
    dispatcher
        .registry()
        .register(
            ParticipantKey::User(user_id.to_string()),
            ChannelHandle::new(client.conn_id, client.tx.clone()),
        )
        .await;
    client
}

async fn join(dispatcher: &Dispatcher, client: &TestClient, conversation_id: &str) {
    dispatcher
        .rooms()
        .join(conversation_id, client.conn_id, client.tx.clone())
        .await;
}

fn text_message(conversation_id: &str, sender_id: &str, content: &str) -> SendMessagePayload {
    SendMessagePayload {
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        content: Some(content.to_string()),
        is_encrypted: false,
        file_url: None,
        file_type: None,
        file_name: None,
        reply_to: None,
        reply_snippet: None,
        reply_sender_name: None,
    }
}

/// Scenario A: both parties of a direct chat connected — the message is
/// persisted as delivered, the room sees it, the sender gets the receipt.
#[tokio::test]
async fn direct_message_to_connected_recipient_is_delivered() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    let mut bob = connect(&dispatcher, "bob").await;
    join(&dispatcher, &alice, "c1").await;
    join(&dispatcher, &bob, "c1").await;

    messages::submit(&dispatcher, text_message("c1", "alice", "hi"))
        .await
        .unwrap();

    let bob_events = bob.drain();
    let received = bob_events
        .iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage(view) => Some(view),
            _ => None,
        })
        .expect("room member should receive the message");
    assert_eq!(received.content.as_deref(), Some("hi"));
    assert_eq!(received.sender.full_name, "Alice Arden");
    assert_eq!(received.read_by, vec!["alice".to_string()]);

    let delivered = alice.drain().into_iter().find_map(|e| match e {
        ServerEvent::MessageDelivered {
            message_id,
            conversation_id,
        } => Some((message_id, conversation_id)),
        _ => None,
    });
    let (message_id, conversation_id) = delivered.expect("sender should get the delivery receipt");
    assert_eq!(conversation_id, "c1");

    let status = dispatcher
        .db()
        .get_message(&message_id)
        .unwrap()
        .unwrap()
        .status;
    assert_eq!(status, "delivered");
}

/// Scenario B: recipient offline — status stays sent and no receipt fires.
#[tokio::test]
async fn direct_message_to_offline_recipient_stays_sent() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    join(&dispatcher, &alice, "c1").await;

    messages::submit(&dispatcher, text_message("c1", "alice", "hi"))
        .await
        .unwrap();

    let events = alice.drain();
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ServerEvent::MessageDelivered { .. })),
        "no delivery receipt for an offline recipient"
    );

    let received = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage(view) => Some(view),
            _ => None,
        })
        .expect("sender is in the room and still sees the broadcast");
    let status = dispatcher
        .db()
        .get_message(&received.id)
        .unwrap()
        .unwrap()
        .status;
    assert_eq!(status, "sent");
}

/// Scenario C: three unread messages, one markMessagesAsRead — all flip to
/// read, the read set gains the reader, the sender hears exactly once.
#[tokio::test]
async fn mark_read_flips_all_unread_and_notifies_sender_once() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    let _bob = connect(&dispatcher, "bob").await;

    for content in ["one", "two", "three"] {
        messages::submit(&dispatcher, text_message("c1", "alice", content))
            .await
            .unwrap();
    }
    alice.drain();

    receipts::mark_read(&dispatcher, "c1", &ParticipantKey::User("bob".into()))
        .await
        .unwrap();

    let read_events: Vec<_> = alice
        .drain()
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::MessagesRead { conversation_id } if conversation_id == "c1"))
        .collect();
    assert_eq!(read_events.len(), 1);

    let db = dispatcher.db();
    let ids: Vec<String> = db
        .with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM messages WHERE conversation_id = 'c1'")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(ids)
        })
        .unwrap();
    assert_eq!(ids.len(), 3);
    for id in &ids {
        assert_eq!(db.get_message(id).unwrap().unwrap().status, "read");
        let mut read_by = db.get_read_by(id).unwrap();
        read_by.sort();
        assert_eq!(read_by, vec!["alice".to_string(), "bob".to_string()]);
    }

    // Idempotent: a second pass changes nothing and stays silent.
    receipts::mark_read(&dispatcher, "c1", &ParticipantKey::User("bob".into()))
        .await
        .unwrap();
    assert!(alice.drain().is_empty());
}

/// Scenario D: reacting twice with different emojis leaves exactly one
/// entry carrying the second emoji.
#[tokio::test]
async fn re_reacting_replaces_the_emoji_in_place() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    let _bob = connect(&dispatcher, "bob").await;
    join(&dispatcher, &alice, "c1").await;

    messages::submit(&dispatcher, text_message("c1", "bob", "react to me"))
        .await
        .unwrap();
    let message_id = alice
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage(view) => Some(view.id),
            _ => None,
        })
        .unwrap();

    let reactor = ParticipantKey::User("alice".into());
    reactions::react(&dispatcher, "c1", &message_id, "👍", &reactor)
        .await
        .unwrap();
    reactions::react(&dispatcher, "c1", &message_id, "❤️", &reactor)
        .await
        .unwrap();

    let updates: Vec<_> = alice
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::MessageUpdated(view) => Some(view),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 2);

    let last = updates.last().unwrap();
    assert_eq!(last.reactions.len(), 1);
    assert_eq!(last.reactions[0].emoji, "❤️");
    assert_eq!(last.reactions[0].user, "alice");
    assert_eq!(last.reactions[0].user_name, "Alice Arden");
}

/// Toggle is its own inverse: same emoji twice leaves no reaction behind.
#[tokio::test]
async fn same_emoji_twice_toggles_off() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    join(&dispatcher, &alice, "c1").await;

    messages::submit(&dispatcher, text_message("c1", "alice", "hello"))
        .await
        .unwrap();
    let message_id = alice
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage(view) => Some(view.id),
            _ => None,
        })
        .unwrap();

    let reactor = ParticipantKey::User("alice".into());
    reactions::react(&dispatcher, "c1", &message_id, "👍", &reactor)
        .await
        .unwrap();
    reactions::react(&dispatcher, "c1", &message_id, "👍", &reactor)
        .await
        .unwrap();

    let last = alice
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::MessageUpdated(view) => Some(view),
            _ => None,
        })
        .next_back()
        .unwrap();
    assert!(last.reactions.is_empty());
}

/// Scenario E: group key aimed at an offline recipient vanishes silently —
/// no receiveGroupKey anywhere, no error back to the sender.
#[tokio::test]
async fn group_key_to_offline_recipient_is_dropped_silently() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;

    signaling::share_group_key(
        &dispatcher,
        "g1".to_string(),
        "alice".to_string(),
        "carol".to_string(),
        "b64-wrapped-key".to_string(),
    )
    .await;

    let events = alice.drain();
    assert!(events.is_empty(), "sender hears nothing: {:?}", events.len());
}

/// Group key to a connected recipient goes to that channel only.
#[tokio::test]
async fn group_key_reaches_only_its_recipient() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    let mut bob = connect(&dispatcher, "bob").await;
    let mut carol = connect(&dispatcher, "carol").await;

    signaling::share_group_key(
        &dispatcher,
        "g1".to_string(),
        "alice".to_string(),
        "carol".to_string(),
        "b64-wrapped-key".to_string(),
    )
    .await;

    let received = carol.drain().into_iter().find_map(|e| match e {
        ServerEvent::ReceiveGroupKey {
            conversation_id,
            sender_id,
            encrypted_key,
        } => Some((conversation_id, sender_id, encrypted_key)),
        _ => None,
    });
    assert_eq!(
        received,
        Some((
            "g1".to_string(),
            "alice".to_string(),
            "b64-wrapped-key".to_string()
        ))
    );
    assert!(alice.drain().is_empty());
    assert!(bob.drain().is_empty());
}

/// Group conversations never enter `delivered`; unread state rides on the
/// read set instead.
#[tokio::test]
async fn group_messages_skip_the_delivered_status() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    let _bob = connect(&dispatcher, "bob").await;
    let _carol = connect(&dispatcher, "carol").await;
    join(&dispatcher, &alice, "g1").await;

    messages::submit(&dispatcher, text_message("g1", "alice", "hey all"))
        .await
        .unwrap();

    let events = alice.drain();
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ServerEvent::MessageDelivered { .. }))
    );
    let view = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage(view) => Some(view),
            _ => None,
        })
        .unwrap();
    assert_eq!(view.status, MessageStatus::Sent);
}

/// Sending into an unknown conversation reports an error and leaves no
/// visible state, but the orphaned row itself is kept (known gap).
#[tokio::test]
async fn unknown_conversation_is_an_error_without_visible_state() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    join(&dispatcher, &alice, "missing").await;

    let err = messages::submit(&dispatcher, text_message("missing", "alice", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Conversation not found.");
    assert!(alice.drain().is_empty());

    // The row written before the conversation lookup stays behind.
    let orphans: i64 = dispatcher
        .db()
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = 'missing'",
                [],
                |r| r.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(orphans, 1);
}

/// The conversation-list fan-out reaches registered participants that
/// never joined the room.
#[tokio::test]
async fn conversation_update_reaches_participants_outside_the_room() {
    let dispatcher = seeded_dispatcher();
    let _alice = connect(&dispatcher, "alice").await;
    let mut bob = connect(&dispatcher, "bob").await;
    // bob never joins the room

    messages::submit(&dispatcher, text_message("c1", "alice", "ping"))
        .await
        .unwrap();

    let events = bob.drain();
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ServerEvent::ReceiveMessage(_))),
        "no room broadcast without a join"
    );
    let update = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::ConversationUpdated(view) => Some(view),
            _ => None,
        })
        .expect("registered participant still gets the list refresh");
    assert_eq!(update.id, "c1");
    assert!(!update.is_group_chat);
    assert_eq!(update.participants.len(), 2);
    let last = update.last_message.as_ref().unwrap();
    assert_eq!(last.content.as_deref(), Some("ping"));
}

/// Validation rejects a message with neither content nor file before any
/// persistence happens.
#[tokio::test]
async fn blank_message_is_rejected_without_persistence() {
    let dispatcher = seeded_dispatcher();
    let mut payload = text_message("c1", "alice", "");
    payload.content = Some("   ".to_string());

    let err = messages::submit(&dispatcher, payload).await.unwrap_err();
    assert_eq!(err.to_string(), "Missing data for sending message.");

    let count: i64 = dispatcher
        .db()
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(count, 0);
}

/// A file-only message is valid even with no text content.
#[tokio::test]
async fn file_attachment_satisfies_the_content_requirement() {
    let dispatcher = seeded_dispatcher();
    let mut alice = connect(&dispatcher, "alice").await;
    join(&dispatcher, &alice, "c1").await;

    let mut payload = text_message("c1", "alice", "");
    payload.content = None;
    payload.file_url = Some("/uploads/report.pdf".to_string());
    payload.file_type = Some("application/pdf".to_string());
    payload.file_name = Some("report.pdf".to_string());

    messages::submit(&dispatcher, payload).await.unwrap();

    let view = alice
        .drain()
        .into_iter()
        .find_map(|e| match e {
            ServerEvent::ReceiveMessage(view) => Some(view),
            _ => None,
        })
        .unwrap();
    assert_eq!(view.file_url.as_deref(), Some("/uploads/report.pdf"));
    assert_eq!(view.file_name.as_deref(), Some("report.pdf"));
    assert!(view.content.is_none());
}
