use tracing::{debug, warn};
use uuid::Uuid;

use parley_types::events::ServerEvent;
use parley_types::participant::ParticipantKey;

use crate::dispatcher::Dispatcher;

/// Typing indicator: multicast to the conversation room excluding the
/// typist's own channel. Fire-and-forget — a dropped event clears on the
/// receiving client's own timeout.
pub async fn typing(
    dispatcher: &Dispatcher,
    conn_id: Uuid,
    conversation_id: &str,
    user_id: &str,
    user_name: &str,
    is_typing: bool,
) {
    if conversation_id.is_empty() {
        return;
    }
    dispatcher
        .rooms()
        .send(
            conversation_id,
            &ServerEvent::UserTyping {
                conversation_id: conversation_id.to_string(),
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
                is_typing,
            },
            Some(conn_id),
        )
        .await;
}

/// Relay an encrypted group key straight to its single recipient's
/// registered channel — never to the room. Offline recipients mean the
/// payload is dropped; there is no queuing of key material, the sender
/// retries after the next presence update shows the recipient online.
pub async fn share_group_key(
    dispatcher: &Dispatcher,
    conversation_id: String,
    sender_id: String,
    recipient_id: String,
    encrypted_key: String,
) {
    if conversation_id.is_empty()
        || sender_id.is_empty()
        || recipient_id.is_empty()
        || encrypted_key.is_empty()
    {
        warn!("shareGroupKey with missing fields dropped");
        return;
    }

    let recipient_key = ParticipantKey::User(recipient_id.clone());
    let event = ServerEvent::ReceiveGroupKey {
        conversation_id,
        sender_id,
        encrypted_key,
    };

    if dispatcher.send_to_key(&recipient_key, event).await {
        debug!("relayed group key to {}", recipient_id);
    } else {
        debug!("recipient {} offline, group key dropped", recipient_id);
    }
}
