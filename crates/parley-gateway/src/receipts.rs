use tracing::debug;

use parley_db::models::ConversationRow;
use parley_types::events::ServerEvent;
use parley_types::participant::ParticipantKey;

use crate::dispatcher::Dispatcher;
use crate::error::EventError;

/// Bulk-transition the reader's unread messages in a conversation to
/// `read` and tell the other participants. Idempotent: a second run finds
/// nothing to change and stays silent.
pub async fn mark_read(
    dispatcher: &Dispatcher,
    conversation_id: &str,
    reader: &ParticipantKey,
) -> Result<(), EventError> {
    if conversation_id.is_empty() {
        return Err(EventError::Validation("markMessagesAsRead missing conversation id."));
    }

    let db = dispatcher.db();
    let id = conversation_id.to_string();
    let reader_id = reader.id().to_string();

    let outcome = tokio::task::spawn_blocking(
        move || -> anyhow::Result<Option<(ConversationRow, usize)>> {
            let Some(convo) = db.get_conversation(&id)? else {
                return Ok(None);
            };
            let changed = db.mark_conversation_read(&id, &reader_id)?;
            Ok(Some((convo, changed)))
        },
    )
    .await??;

    let Some((conversation, changed)) = outcome else {
        // Unknown conversations are dropped without a client error.
        debug!("markMessagesAsRead for unknown conversation {}", conversation_id);
        return Ok(());
    };

    debug!(
        "{} marked {} messages read in conversation {}",
        reader, changed, conversation_id
    );

    if changed == 0 {
        return Ok(());
    }

    // Notify every other participant whose channel is registered that the
    // conversation as a whole is caught up — not which messages changed.
    for participant_id in conversation
        .participant_ids
        .iter()
        .filter(|id| id.as_str() != reader.id())
    {
        dispatcher
            .send_to_key(
                &ParticipantKey::User(participant_id.clone()),
                ServerEvent::MessagesRead {
                    conversation_id: conversation_id.to_string(),
                },
            )
            .await;
    }

    Ok(())
}
