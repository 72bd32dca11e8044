use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use parley_db::Database;
use parley_db::models::{ConversationRow, MessageRow, ReactionRow, UserRow};
use parley_types::models::{
    ConversationView, MessageStatus, MessageView, ParticipantProfile, ReactionEntry,
};

use crate::error::EventError;

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Try RFC 3339 first, then parse as naive UTC.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

fn profile(user: UserRow) -> ParticipantProfile {
    ParticipantProfile {
        id: user.id,
        full_name: user.full_name,
        email: user.email,
        profile_picture_url: user.profile_picture_url,
    }
}

fn assemble(row: MessageRow, read_by: Vec<String>, reactions: Vec<ReactionRow>) -> MessageView {
    MessageView {
        sender: ParticipantProfile {
            id: row.sender_id,
            // LEFT JOIN: a vanished sender must not hide the message
            full_name: row.sender_full_name.unwrap_or_else(|| "unknown".to_string()),
            email: row.sender_email.unwrap_or_default(),
            profile_picture_url: row.sender_picture_url,
        },
        id: row.id,
        conversation_id: row.conversation_id,
        content: row.content,
        file_url: row.file_url,
        file_type: row.file_type,
        file_name: row.file_name,
        status: MessageStatus::parse(&row.status),
        read_by,
        reactions: reactions
            .into_iter()
            .map(|r| ReactionEntry {
                emoji: r.emoji,
                user: r.user_id,
                user_name: r.user_name,
            })
            .collect(),
        reply_to: row.reply_to,
        reply_snippet: row.reply_snippet,
        reply_sender_name: row.reply_sender_name,
        is_encrypted: row.is_encrypted,
        created_at: parse_timestamp(&row.created_at),
    }
}

/// Load a message with sender display fields, read set, and reactions
/// resolved — the populated shape every broadcast carries.
pub(crate) async fn load_message_view(
    db: &Arc<Database>,
    message_id: &str,
) -> Result<Option<MessageView>, EventError> {
    let db = db.clone();
    let id = message_id.to_string();

    let loaded = tokio::task::spawn_blocking(
        move || -> anyhow::Result<Option<(MessageRow, Vec<String>, Vec<ReactionRow>)>> {
            let Some(row) = db.get_message(&id)? else {
                return Ok(None);
            };
            let read_by = db.get_read_by(&id)?;
            let reactions = db.get_reactions(&id)?;
            Ok(Some((row, read_by, reactions)))
        },
    )
    .await??;

    Ok(loaded.map(|(row, read_by, reactions)| assemble(row, read_by, reactions)))
}

/// Load a conversation with participants and last message populated.
pub(crate) async fn load_conversation_view(
    db: &Arc<Database>,
    conversation_id: &str,
) -> Result<Option<ConversationView>, EventError> {
    let blocking_db = db.clone();
    let id = conversation_id.to_string();

    let loaded = tokio::task::spawn_blocking(
        move || -> anyhow::Result<Option<(ConversationRow, Vec<UserRow>)>> {
            let Some(convo) = blocking_db.get_conversation(&id)? else {
                return Ok(None);
            };
            let participants = blocking_db.get_conversation_participants(&id)?;
            Ok(Some((convo, participants)))
        },
    )
    .await??;

    let Some((convo, participants)) = loaded else {
        return Ok(None);
    };

    let last_message = match convo.last_message_id.as_deref() {
        Some(message_id) => load_message_view(db, message_id).await?,
        None => None,
    };

    Ok(Some(ConversationView {
        id: convo.id,
        participants: participants.into_iter().map(profile).collect(),
        is_group_chat: convo.is_group_chat,
        last_message,
        updated_at: parse_timestamp(&convo.updated_at),
    }))
}
