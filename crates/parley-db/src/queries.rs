use crate::Database;
use crate::models::{ConversationRow, MessageRow, NewMessage, ReactionRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users & admins --

    pub fn create_user(
        &self,
        id: &str,
        full_name: &str,
        email: &str,
        profile_picture_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, full_name, email, profile_picture_url) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, full_name, email, profile_picture_url],
            )?;
            Ok(())
        })
    }

    pub fn create_admin(&self, id: &str, full_name: &str, email: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO admins (id, full_name, email) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, full_name, email],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Stamp a user's last-seen time. Missing ids are a no-op.
    pub fn set_user_last_seen(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET last_seen = datetime('now') WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    /// Stamp an administrator's last-seen time. Admins live in their own
    /// table — writing a user row here would corrupt staff presence history.
    pub fn set_admin_last_seen(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE admins SET last_seen = datetime('now') WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    // -- Conversations --

    pub fn create_conversation(
        &self,
        id: &str,
        is_group_chat: bool,
        participant_ids: &[&str],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO conversations (id, is_group_chat) VALUES (?1, ?2)",
                rusqlite::params![id, is_group_chat],
            )?;
            for user_id in participant_ids {
                tx.execute(
                    "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                    rusqlite::params![id, user_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let head = conn
                .query_row(
                    "SELECT id, is_group_chat, last_message_id, updated_at
                     FROM conversations WHERE id = ?1",
                    [id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, bool>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((id, is_group_chat, last_message_id, updated_at)) = head else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT user_id FROM conversation_participants WHERE conversation_id = ?1",
            )?;
            let participant_ids = stmt
                .query_map([&id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(Some(ConversationRow {
                id,
                is_group_chat,
                last_message_id,
                updated_at,
                participant_ids,
            }))
        })
    }

    /// Point the conversation at its newest message and bump updated_at.
    /// Returns false when the conversation does not exist.
    pub fn touch_conversation(&self, id: &str, last_message_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE conversations
                 SET last_message_id = ?2, updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![id, last_message_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_conversation_participants(&self, conversation_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.full_name, u.email, u.profile_picture_url, u.last_seen
                 FROM users u
                 JOIN conversation_participants cp ON cp.user_id = u.id
                 WHERE cp.conversation_id = ?1",
            )?;
            let rows = stmt
                .query_map([conversation_id], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages
                     (id, conversation_id, sender_id, content,
                      file_url, file_type, file_name,
                      status, is_encrypted,
                      reply_to, reply_snippet, reply_sender_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'sent', ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    msg.id,
                    msg.conversation_id,
                    msg.sender_id,
                    msg.content,
                    msg.file_url,
                    msg.file_type,
                    msg.file_name,
                    msg.is_encrypted,
                    msg.reply_to,
                    msg.reply_snippet,
                    msg.reply_sender_name,
                ],
            )?;
            // The sender has implicitly read their own message.
            tx.execute(
                "INSERT INTO message_read_by (message_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![msg.id, msg.sender_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            // LEFT JOIN users to resolve sender display fields in one query
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_id,
                        u.full_name, u.email, u.profile_picture_url,
                        m.content, m.file_url, m.file_type, m.file_name,
                        m.status, m.is_encrypted,
                        m.reply_to, m.reply_snippet, m.reply_sender_name,
                        m.created_at
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.id = ?1",
            )?;

            let row = stmt
                .query_row([id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_full_name: row.get(3)?,
                        sender_email: row.get(4)?,
                        sender_picture_url: row.get(5)?,
                        content: row.get(6)?,
                        file_url: row.get(7)?,
                        file_type: row.get(8)?,
                        file_name: row.get(9)?,
                        status: row.get(10)?,
                        is_encrypted: row.get(11)?,
                        reply_to: row.get(12)?,
                        reply_snippet: row.get(13)?,
                        reply_sender_name: row.get(14)?,
                        created_at: row.get(15)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    pub fn get_read_by(&self, message_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM message_read_by WHERE message_id = ?1")?;
            let rows = stmt
                .query_map([message_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    /// Transition sent -> delivered. The status predicate keeps the
    /// transition monotonic: a message already read never regresses.
    pub fn mark_delivered(&self, message_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET status = 'delivered' WHERE id = ?1 AND status = 'sent'",
                [message_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Bulk read transition for every message in the conversation not sent
    /// by the reader and not yet read. Returns the number of messages
    /// changed; safe to re-run.
    pub fn mark_conversation_read(&self, conversation_id: &str, reader_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            // Accumulate read_by first, while the status filter still
            // identifies the affected rows.
            tx.execute(
                "INSERT OR IGNORE INTO message_read_by (message_id, user_id)
                 SELECT id, ?2 FROM messages
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND status != 'read'",
                rusqlite::params![conversation_id, reader_id],
            )?;
            let changed = tx.execute(
                "UPDATE messages SET status = 'read'
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND status != 'read'",
                rusqlite::params![conversation_id, reader_id],
            )?;
            tx.commit()?;
            Ok(changed)
        })
    }

    // -- Reactions --

    /// Apply a user's reaction to a message: insert when absent, remove on
    /// the same emoji, replace on a different one.
    pub fn apply_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        user_name: &str,
        emoji: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT emoji FROM message_reactions WHERE message_id = ?1 AND user_id = ?2",
                    rusqlite::params![message_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                None => {
                    conn.execute(
                        "INSERT INTO message_reactions (message_id, user_id, emoji, user_name)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![message_id, user_id, emoji, user_name],
                    )?;
                }
                Some(prev) if prev == emoji => {
                    conn.execute(
                        "DELETE FROM message_reactions WHERE message_id = ?1 AND user_id = ?2",
                        rusqlite::params![message_id, user_id],
                    )?;
                }
                Some(_) => {
                    conn.execute(
                        "UPDATE message_reactions SET emoji = ?3
                         WHERE message_id = ?1 AND user_id = ?2",
                        rusqlite::params![message_id, user_id, emoji],
                    )?;
                }
            }
            Ok(())
        })
    }

    pub fn get_reactions(&self, message_id: &str) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT message_id, user_id, emoji, user_name
                 FROM message_reactions
                 WHERE message_id = ?1
                 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([message_id], |row| {
                    Ok(ReactionRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        emoji: row.get(2)?,
                        user_name: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, email, profile_picture_url, last_seen FROM users WHERE id = ?1",
    )?;

    let row = stmt.query_row([id], map_user_row).optional()?;

    Ok(row)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        profile_picture_url: row.get(3)?,
        last_seen: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
