use anyhow::anyhow;
use tracing::debug;
use uuid::Uuid;

use parley_db::models::NewMessage;
use parley_types::events::{SendMessagePayload, ServerEvent};
use parley_types::participant::ParticipantKey;

use crate::dispatcher::Dispatcher;
use crate::error::EventError;
use crate::views::{load_conversation_view, load_message_view};

/// The message pipeline: validate, persist, room multicast, direct-chat
/// delivery receipt, conversation-list fan-out.
pub async fn submit(dispatcher: &Dispatcher, payload: SendMessagePayload) -> Result<(), EventError> {
    let content_blank = payload
        .content
        .as_deref()
        .is_none_or(|c| c.trim().is_empty());
    let file_blank = payload.file_url.as_deref().is_none_or(str::is_empty);
    if payload.conversation_id.is_empty() || payload.sender_id.is_empty() || (content_blank && file_blank)
    {
        return Err(EventError::Validation("Missing data for sending message."));
    }

    let message_id = Uuid::new_v4().to_string();

    // Persist with status=sent; the sender is seeded into the read set.
    {
        let db = dispatcher.db();
        let id = message_id.clone();
        let p = payload.clone();
        tokio::task::spawn_blocking(move || {
            db.insert_message(&NewMessage {
                id: &id,
                conversation_id: &p.conversation_id,
                sender_id: &p.sender_id,
                content: p.content.as_deref(),
                file_url: p.file_url.as_deref(),
                file_type: p.file_type.as_deref(),
                file_name: p.file_name.as_deref(),
                is_encrypted: p.is_encrypted,
                reply_to: p.reply_to.as_deref(),
                reply_snippet: p.reply_snippet.as_deref(),
                reply_sender_name: p.reply_sender_name.as_deref(),
            })
        })
        .await??;
    }

    // Point the conversation at the new message. When the conversation is
    // missing the row inserted above stays behind as an orphan (see
    // DESIGN.md) and nothing becomes visible to other participants.
    let conversation = {
        let db = dispatcher.db();
        let conversation_id = payload.conversation_id.clone();
        let last_message_id = message_id.clone();
        tokio::task::spawn_blocking(move || {
            if !db.touch_conversation(&conversation_id, &last_message_id)? {
                return Ok(None);
            }
            db.get_conversation(&conversation_id)
        })
        .await??
    }
    .ok_or(EventError::NotFound("Conversation not found."))?;

    let view = load_message_view(&dispatcher.db(), &message_id)
        .await?
        .ok_or_else(|| EventError::Storage(anyhow!("message {} vanished after insert", message_id)))?;

    // Room multicast: everyone with the conversation open on screen.
    dispatcher
        .rooms()
        .send(
            &payload.conversation_id,
            &ServerEvent::ReceiveMessage(view),
            None,
        )
        .await;

    // Delivery receipt for direct chats only. Groups skip `delivered` and
    // track unread state through the read set instead. The registry is
    // the sole reachability oracle here.
    if !conversation.is_group_chat && conversation.participant_ids.len() == 2 {
        let recipient = conversation
            .participant_ids
            .iter()
            .find(|id| **id != payload.sender_id);
        if let Some(recipient) = recipient {
            let recipient_key = ParticipantKey::User(recipient.clone());
            if dispatcher.registry().lookup(&recipient_key).await.is_some() {
                let db = dispatcher.db();
                let id = message_id.clone();
                let delivered = tokio::task::spawn_blocking(move || db.mark_delivered(&id)).await??;
                if delivered {
                    // Only the sender's own sessions learn the status change.
                    let sender_key = ParticipantKey::User(payload.sender_id.clone());
                    dispatcher
                        .send_to_key(
                            &sender_key,
                            ServerEvent::MessageDelivered {
                                message_id: message_id.clone(),
                                conversation_id: payload.conversation_id.clone(),
                            },
                        )
                        .await;
                }
            }
        }
    }

    // Second fan-out, distinct from the room multicast: participants on a
    // conversation-list screen never joined the room but still need the
    // preview to reorder. Push to each registered channel directly.
    if let Some(convo_view) = load_conversation_view(&dispatcher.db(), &payload.conversation_id).await?
    {
        for participant_id in &conversation.participant_ids {
            dispatcher
                .send_to_key(
                    &ParticipantKey::User(participant_id.clone()),
                    ServerEvent::ConversationUpdated(convo_view.clone()),
                )
                .await;
        }
    }

    debug!(
        "message {} stored and fanned out in conversation {}",
        message_id, payload.conversation_id
    );
    Ok(())
}
