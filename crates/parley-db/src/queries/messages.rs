use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Params, params};
use uuid::Uuid;

use parley_types::models::Message;

use super::query_pairs;
use super::threads::set_last_read;
use crate::Database;
use crate::models::{MessageRow, parse_id, ts};

const MESSAGE_COLUMNS: &str =
    "m.id, m.thread_id, m.sender_id, m.content_type, m.content, m.attachments, m.created_at";

/// Hides rows the viewer (bound as `?2`) has tombstoned.
const VISIBLE_TO_VIEWER: &str =
    "NOT EXISTS (SELECT 1 FROM message_hidden h WHERE h.message_id = m.id AND h.user_id = ?2)";

/// Newest message of the thread bound as `?1`.
const NEWEST_IN_THREAD: &str =
    "SELECT id FROM messages WHERE thread_id = ?1 ORDER BY created_at DESC, seq DESC LIMIT 1";

impl Database {
    // -- Messages --

    /// Append messages to a thread as one unit. Message rows (with their initial
    /// read receipts) are written first, then the thread's `last_message_id` and
    /// the sender's `last_read_at`. The thread's last message becomes the newest
    /// stored message, which for a single append is the last one in the slice.
    pub fn append_messages(
        &self,
        thread_id: Uuid,
        sender_id: Uuid,
        messages: &[Message],
        at: DateTime<Utc>,
    ) -> Result<()> {
        if messages.is_empty() {
            bail!("append_messages called with no messages");
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut insert = tx.prepare(
                    "INSERT INTO messages (id, thread_id, sender_id, content_type, content, attachments, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                let mut receipt = tx.prepare(
                    "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) VALUES (?1, ?2, ?3)",
                )?;

                for message in messages {
                    let message_id = message.id.to_string();
                    insert.execute(params![
                        message_id,
                        message.thread_id.to_string(),
                        message.sender_id.to_string(),
                        message.content_type.as_str(),
                        message.content,
                        serde_json::to_string(&message.attachments)?,
                        ts(message.created_at),
                    ])?;
                    for reader in &message.read_by {
                        receipt.execute(params![message_id, reader.to_string(), ts(at)])?;
                    }
                }
            }

            // Same ordering as the delete recompute, so concurrent appends
            // can't leave the pointer on an older message.
            let thread_id = thread_id.to_string();
            tx.execute(
                &format!(
                    "UPDATE threads SET last_message_id = ({}), updated_at = ?2 WHERE id = ?1",
                    NEWEST_IN_THREAD
                ),
                params![thread_id, ts(at)],
            )?;
            set_last_read(&tx, &thread_id, &sender_id.to_string(), at)?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            let messages = query_messages(conn, "m.id = ?1", [id.to_string()], "m.seq")?;
            Ok(messages.into_iter().next())
        })
    }

    /// Every message in the thread the viewer has not hidden, oldest first.
    pub fn list_thread_messages(&self, thread_id: Uuid, viewer_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!("m.thread_id = ?1 AND {}", VISIBLE_TO_VIEWER),
                [thread_id.to_string(), viewer_id.to_string()],
                "m.created_at ASC, m.seq ASC",
            )
        })
    }

    /// Messages carrying attachments that the viewer can see, newest first.
    pub fn list_attachment_messages(&self, thread_id: Uuid, viewer_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!("m.thread_id = ?1 AND m.attachments != '[]' AND {}", VISIBLE_TO_VIEWER),
                [thread_id.to_string(), viewer_id.to_string()],
                "m.created_at DESC, m.seq DESC",
            )
        })
    }

    /// Hard-delete a message. If it was the thread's last message, the pointer
    /// moves to the newest remaining one (or NULL) in the same transaction.
    /// Returns the thread's last message afterwards.
    pub fn delete_message(
        &self,
        message_id: Uuid,
        thread_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let message_id = message_id.to_string();
            let thread_id = thread_id.to_string();

            tx.execute("DELETE FROM messages WHERE id = ?1", [&message_id])?;
            tx.execute(
                &format!(
                    "UPDATE threads SET last_message_id = ({}), updated_at = ?3
                     WHERE id = ?1 AND last_message_id = ?2",
                    NEWEST_IN_THREAD
                ),
                params![thread_id, message_id, ts(at)],
            )?;

            let last: Option<String> = tx
                .query_row(
                    "SELECT last_message_id FROM threads WHERE id = ?1",
                    [&thread_id],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();

            tx.commit()?;
            Ok(last.as_deref().map(parse_id))
        })
    }

    /// Tombstone a message for one viewer. Returns false if it was already hidden.
    pub fn hide_message(&self, message_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO message_hidden (message_id, user_id, hidden_at) VALUES (?1, ?2, ?3)",
                params![message_id.to_string(), user_id.to_string(), ts(at)],
            )?;
            Ok(inserted > 0)
        })
    }

    // -- Read receipts --

    /// Record one read receipt and bump the reader's watermark.
    /// Returns false if the receipt already existed.
    pub fn mark_message_read(
        &self,
        message_id: Uuid,
        thread_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let user_id = user_id.to_string();
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) VALUES (?1, ?2, ?3)",
                params![message_id.to_string(), user_id, ts(at)],
            )?;
            set_last_read(&tx, &thread_id.to_string(), &user_id, at)?;
            tx.commit()?;
            Ok(inserted > 0)
        })
    }

    /// Bulk receipt for every message in the thread not sent by `user_id` and not
    /// yet read by them. Returns how many receipts were added.
    pub fn mark_thread_read(&self, thread_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let thread_id = thread_id.to_string();
            let user_id = user_id.to_string();
            let added = tx.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at)
                 SELECT id, ?2, ?3 FROM messages WHERE thread_id = ?1 AND sender_id != ?2",
                params![thread_id, user_id, ts(at)],
            )?;
            set_last_read(&tx, &thread_id, &user_id, at)?;
            tx.commit()?;
            Ok(added)
        })
    }

    /// Unread counts per thread for every thread `user_id` belongs to (or just
    /// `thread_id`). A message is unread when someone else sent it and the user
    /// has neither read nor hidden it.
    pub fn unread_counts(&self, user_id: Uuid, thread_id: Option<Uuid>) -> Result<Vec<(Uuid, usize)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tm.thread_id, COUNT(m.id)
                 FROM thread_members tm
                 LEFT JOIN messages m
                   ON m.thread_id = tm.thread_id
                  AND m.sender_id != tm.user_id
                  AND NOT EXISTS (
                        SELECT 1 FROM message_reads r WHERE r.message_id = m.id AND r.user_id = tm.user_id
                  )
                  AND NOT EXISTS (
                        SELECT 1 FROM message_hidden h WHERE h.message_id = m.id AND h.user_id = tm.user_id
                  )
                 WHERE tm.user_id = ?1 AND (?2 IS NULL OR tm.thread_id = ?2)
                 GROUP BY tm.thread_id
                 ORDER BY tm.thread_id",
            )?;

            let rows = stmt
                .query_map(
                    params![user_id.to_string(), thread_id.map(|id| id.to_string())],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .map(|(id, count)| (parse_id(&id), count.max(0) as usize))
                .collect())
        })
    }

    // -- Reactions --

    /// Append a raw reaction token. Returns false if the exact token exists.
    pub fn insert_reaction(&self, message_id: Uuid, token: &str, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO reactions (message_id, token, created_at) VALUES (?1, ?2, ?3)",
                params![message_id.to_string(), token, ts(at)],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns false if the token was not present.
    pub fn delete_reaction(&self, message_id: Uuid, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND token = ?2",
                params![message_id.to_string(), token],
            )?;
            Ok(removed > 0)
        })
    }

    /// Raw tokens in insertion order.
    pub fn reaction_tokens(&self, message_id: Uuid) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT token FROM reactions WHERE message_id = ?1 ORDER BY seq")?;
            let tokens = stmt
                .query_map([message_id.to_string()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(tokens)
        })
    }
}

fn query_messages(
    conn: &Connection,
    filter: &str,
    params: impl Params,
    order_by: &str,
) -> Result<Vec<Message>> {
    let sql = format!(
        "SELECT {} FROM messages m WHERE {} ORDER BY {}",
        MESSAGE_COLUMNS, filter, order_by
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                sender_id: row.get(2)?,
                content_type: row.get(3)?,
                content: row.get(4)?,
                attachments: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let index: HashMap<String, usize> = ids.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
    let mut messages: Vec<Message> = rows.into_iter().map(MessageRow::into_message).collect();

    // Side tables, batch-fetched for the whole page
    let reads = query_pairs(
        conn,
        "SELECT message_id, user_id FROM message_reads WHERE message_id IN",
        "read_at, user_id",
        &ids,
    )?;
    for (message_id, user_id) in reads {
        if let Some(&i) = index.get(&message_id) {
            messages[i].read_by.push(parse_id(&user_id));
        }
    }

    let hidden = query_pairs(
        conn,
        "SELECT message_id, user_id FROM message_hidden WHERE message_id IN",
        "hidden_at, user_id",
        &ids,
    )?;
    for (message_id, user_id) in hidden {
        if let Some(&i) = index.get(&message_id) {
            messages[i].deleted_for.push(parse_id(&user_id));
        }
    }

    let reactions = query_pairs(
        conn,
        "SELECT message_id, token FROM reactions WHERE message_id IN",
        "seq",
        &ids,
    )?;
    for (message_id, token) in reactions {
        if let Some(&i) = index.get(&message_id) {
            messages[i].reactions.push(token);
        }
    }

    Ok(messages)
}
