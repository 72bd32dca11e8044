use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                   TEXT PRIMARY KEY,
            full_name            TEXT NOT NULL,
            email                TEXT NOT NULL UNIQUE,
            profile_picture_url  TEXT,
            last_seen            TEXT
        );

        CREATE TABLE IF NOT EXISTS admins (
            id          TEXT PRIMARY KEY,
            full_name   TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            last_seen   TEXT
        );

        CREATE TABLE IF NOT EXISTS conversations (
            id               TEXT PRIMARY KEY,
            is_group_chat    INTEGER NOT NULL DEFAULT 0,
            last_message_id  TEXT,
            updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS conversation_participants (
            conversation_id  TEXT NOT NULL REFERENCES conversations(id),
            user_id          TEXT NOT NULL,
            PRIMARY KEY (conversation_id, user_id)
        );

        -- No FK from messages to conversations: a message whose conversation
        -- update failed stays behind as an orphan (see DESIGN.md).
        CREATE TABLE IF NOT EXISTS messages (
            id                 TEXT PRIMARY KEY,
            conversation_id    TEXT NOT NULL,
            sender_id          TEXT NOT NULL,
            content            TEXT,
            file_url           TEXT,
            file_type          TEXT,
            file_name          TEXT,
            status             TEXT NOT NULL DEFAULT 'sent'
                               CHECK (status IN ('sent', 'delivered', 'read')),
            is_encrypted       INTEGER NOT NULL DEFAULT 0,
            reply_to           TEXT,
            reply_snippet      TEXT,
            reply_sender_name  TEXT,
            created_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS message_read_by (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );

        -- One reaction per (message, user), enforced by the primary key.
        CREATE TABLE IF NOT EXISTS message_reactions (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            emoji       TEXT NOT NULL,
            user_name   TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (message_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON message_reactions(message_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
