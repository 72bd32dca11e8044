use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery state of a message. Transitions are one-directional:
/// sent -> delivered -> read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    /// Parse a stored status column. Unknown values fall back to `Sent`
    /// rather than failing the whole row.
    pub fn parse(s: &str) -> Self {
        match s {
            "delivered" => Self::Delivered,
            "read" => Self::Read,
            _ => Self::Sent,
        }
    }
}

/// Display fields of a message sender or conversation participant,
/// resolved server-side so clients never need a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub profile_picture_url: Option<String>,
}

/// One reaction on a message. At most one entry per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionEntry {
    pub emoji: String,
    pub user: String,
    pub user_name: String,
}

/// A message with its sender display fields, read set, and reactions
/// resolved — the shape broadcast to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub sender: ParticipantProfile,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub file_name: Option<String>,
    pub status: MessageStatus,
    pub read_by: Vec<String>,
    pub reactions: Vec<ReactionEntry>,
    pub reply_to: Option<String>,
    pub reply_snippet: Option<String>,
    pub reply_sender_name: Option<String>,
    pub is_encrypted: bool,
    pub created_at: DateTime<Utc>,
}

/// A conversation with participants and last message populated — pushed to
/// each participant's own channel so conversation lists reorder without a
/// room join.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub participants: Vec<ParticipantProfile>,
    pub is_group_chat: bool,
    pub last_message: Option<MessageView>,
    pub updated_at: DateTime<Utc>,
}
