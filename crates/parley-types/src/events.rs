use serde::{Deserialize, Serialize};

use crate::models::{ConversationView, MessageView};

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Join a conversation's room to receive its multicasts
    #[serde(rename_all = "camelCase")]
    JoinConversation { conversation_id: String },

    /// Leave a conversation's room
    #[serde(rename_all = "camelCase")]
    LeaveConversation { conversation_id: String },

    /// Post a message into a conversation
    SendMessage(SendMessagePayload),

    /// Mark every unread message in a conversation as read
    #[serde(rename_all = "camelCase")]
    MarkMessagesAsRead { conversation_id: String },

    /// Toggle an emoji reaction on a message
    #[serde(rename_all = "camelCase")]
    ReactToMessage {
        conversation_id: String,
        message_id: String,
        emoji: String,
    },

    /// Typing indicator on
    #[serde(rename_all = "camelCase")]
    Typing {
        conversation_id: String,
        user_id: String,
        user_name: String,
    },

    /// Typing indicator off
    #[serde(rename_all = "camelCase")]
    StopTyping {
        conversation_id: String,
        user_id: String,
        user_name: String,
    },

    /// Relay an encrypted group key to one recipient
    #[serde(rename_all = "camelCase")]
    ShareGroupKey {
        conversation_id: String,
        sender_id: String,
        recipient_id: String,
        encrypted_key: String,
    },
}

/// Body of a `sendMessage` command. Content is optional when a file
/// descriptor is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub reply_snippet: Option<String>,
    #[serde(default)]
    pub reply_sender_name: Option<String>,
}

/// Events sent FROM server TO clients over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full snapshot of currently connected participant keys. Admin keys
    /// render with an `admin:` prefix; consumers filter client-side.
    ActiveUsers(Vec<String>),

    /// A new message, multicast to the conversation room
    ReceiveMessage(MessageView),

    /// Conversation preview refresh, pushed to each participant's own channel
    ConversationUpdated(ConversationView),

    /// A direct message reached its recipient's channel
    #[serde(rename_all = "camelCase")]
    MessageDelivered {
        message_id: String,
        conversation_id: String,
    },

    /// The reader's side of a conversation has no unread messages left
    #[serde(rename_all = "camelCase")]
    MessagesRead { conversation_id: String },

    /// A message changed after a reaction
    MessageUpdated(MessageView),

    /// Typing indicator, multicast to the room minus the typist
    #[serde(rename_all = "camelCase")]
    UserTyping {
        conversation_id: String,
        user_id: String,
        user_name: String,
        is_typing: bool,
    },

    /// Encrypted group key relayed to its single recipient
    #[serde(rename_all = "camelCase")]
    ReceiveGroupKey {
        conversation_id: String,
        sender_id: String,
        encrypted_key: String,
    },

    /// Processing failure, reported only to the originating channel
    #[serde(rename_all = "camelCase")]
    MessageError {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}
