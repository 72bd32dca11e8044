/// Database row types — these map directly to SQLite rows.
/// Distinct from the parley-types wire models to keep the DB layer
/// independent.

pub struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub profile_picture_url: Option<String>,
    pub last_seen: Option<String>,
}

pub struct ConversationRow {
    pub id: String,
    pub is_group_chat: bool,
    pub last_message_id: Option<String>,
    pub updated_at: String,
    pub participant_ids: Vec<String>,
}

/// A message joined with its sender's display fields. Sender fields are
/// optional because the join is LEFT — a vanished sender must not hide
/// the message.
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_full_name: Option<String>,
    pub sender_email: Option<String>,
    pub sender_picture_url: Option<String>,
    pub content: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub file_name: Option<String>,
    pub status: String,
    pub is_encrypted: bool,
    pub reply_to: Option<String>,
    pub reply_snippet: Option<String>,
    pub reply_sender_name: Option<String>,
    pub created_at: String,
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub user_name: String,
}

/// Insert parameters for a new message. Status always starts at 'sent'
/// and the sender is seeded into the read set.
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub content: Option<&'a str>,
    pub file_url: Option<&'a str>,
    pub file_type: Option<&'a str>,
    pub file_name: Option<&'a str>,
    pub is_encrypted: bool,
    pub reply_to: Option<&'a str>,
    pub reply_snippet: Option<&'a str>,
    pub reply_sender_name: Option<&'a str>,
}
