use anyhow::anyhow;
use tracing::debug;

use parley_types::events::ServerEvent;
use parley_types::participant::ParticipantKey;

use crate::dispatcher::Dispatcher;
use crate::error::EventError;
use crate::views::load_message_view;

/// Toggle the reactor's emoji on a message and rebroadcast the updated
/// message to the conversation room. Same emoji removes, different emoji
/// replaces; racing reactions resolve last-write-wins at the storage
/// layer.
pub async fn react(
    dispatcher: &Dispatcher,
    conversation_id: &str,
    message_id: &str,
    emoji: &str,
    reactor: &ParticipantKey,
) -> Result<(), EventError> {
    if conversation_id.is_empty() || message_id.is_empty() || emoji.is_empty() {
        return Err(EventError::Validation("Missing data for reaction."));
    }

    // The reactor's display name is denormalized into the reaction entry.
    let reactor_row = {
        let db = dispatcher.db();
        let id = reactor.id().to_string();
        tokio::task::spawn_blocking(move || db.get_user(&id)).await??
    }
    .ok_or(EventError::Validation("Missing data for reaction."))?;

    let applied = {
        let db = dispatcher.db();
        let message_id = message_id.to_string();
        let user_id = reactor.id().to_string();
        let user_name = reactor_row.full_name;
        let emoji = emoji.to_string();
        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            // Unknown message ids are dropped without a client error.
            if db.get_message(&message_id)?.is_none() {
                return Ok(false);
            }
            db.apply_reaction(&message_id, &user_id, &user_name, &emoji)?;
            Ok(true)
        })
        .await??
    };

    if !applied {
        debug!("reaction on unknown message {} dropped", message_id);
        return Ok(());
    }

    let view = load_message_view(&dispatcher.db(), message_id)
        .await?
        .ok_or_else(|| EventError::Storage(anyhow!("message {} vanished while reacting", message_id)))?;

    dispatcher
        .rooms()
        .send(conversation_id, &ServerEvent::MessageUpdated(view), None)
        .await;

    Ok(())
}
