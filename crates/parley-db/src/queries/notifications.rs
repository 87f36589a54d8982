use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

use parley_types::models::Notification;

use crate::Database;
use crate::models::{NotificationRow, ts};

impl Database {
    // -- Notifications --

    /// Persist a batch of notifications atomically.
    pub fn insert_notifications(&self, notifications: &[Notification]) -> Result<()> {
        if notifications.is_empty() {
            return Ok(());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO notifications (id, user_id, kind, title, body, ref_id, ref_type, read, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for n in notifications {
                    stmt.execute(params![
                        n.id.to_string(),
                        n.user_id.to_string(),
                        n.kind.as_str(),
                        n.title,
                        n.body,
                        n.ref_id.map(|id| id.to_string()),
                        n.ref_type.map(|t| t.as_str()),
                        n.read,
                        ts(n.created_at),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Newest first.
    pub fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, title, body, ref_id, ref_type, read, created_at
                 FROM notifications WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                        title: row.get(3)?,
                        body: row.get(4)?,
                        ref_id: row.get(5)?,
                        ref_type: row.get(6)?,
                        read: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(NotificationRow::into_notification).collect())
        })
    }

    pub fn count_unread_notifications(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as usize)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id.to_string()],
            )?;
            Ok(changed)
        })
    }

    /// Returns false if no notification with that id belongs to `user_id`.
    pub fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let matched = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                params![notification_id.to_string(), user_id.to_string()],
            )?;
            Ok(matched > 0)
        })
    }
}
