use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Params, Row, params, params_from_iter};
use uuid::Uuid;

use parley_types::models::{PairKey, Thread, ThreadKind, ThreadMember};

use super::{MAX_BOUND_IDS, placeholders};
use crate::Database;
use crate::models::{MemberRow, ThreadRow, ts};

const THREAD_COLUMNS: &str = "t.id, t.kind, t.name, t.avatar, t.member_hash, t.last_message_id,
     t.created_by, t.created_at, t.updated_at";

impl Database {
    // -- Threads --

    /// Insert a direct thread unless one already owns its pair key, then return
    /// whichever thread holds the key. Two racing creators end up with the same row.
    pub fn upsert_direct_thread(&self, thread: &Thread) -> Result<Thread> {
        let hash = thread
            .member_hash
            .as_ref()
            .ok_or_else(|| anyhow!("Direct thread {} has no member hash", thread.id))?
            .clone();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if insert_thread_row(&tx, thread, true)? {
                insert_members(&tx, thread)?;
            }
            let stored = query_threads(&tx, "t.member_hash = ?1", [hash.as_str()])?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("Thread for pair {} missing after upsert", hash))?;
            tx.commit()?;
            Ok(stored)
        })
    }

    pub fn insert_thread(&self, thread: &Thread) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_thread_row(&tx, thread, false)?;
            insert_members(&tx, thread)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_thread(&self, id: Uuid) -> Result<Option<Thread>> {
        self.with_conn(|conn| {
            Ok(query_threads(conn, "t.id = ?1", [id.to_string()])?.into_iter().next())
        })
    }

    /// Returns the thread only if `user_id` is currently a member.
    pub fn get_thread_for_member(&self, id: Uuid, user_id: Uuid) -> Result<Option<Thread>> {
        self.with_conn(|conn| {
            let threads = query_threads(
                conn,
                "t.id = ?1 AND EXISTS (
                    SELECT 1 FROM thread_members tm WHERE tm.thread_id = t.id AND tm.user_id = ?2
                 )",
                [id.to_string(), user_id.to_string()],
            )?;
            Ok(threads.into_iter().next())
        })
    }

    pub fn find_direct_thread(&self, hash: &PairKey) -> Result<Option<Thread>> {
        self.with_conn(|conn| {
            Ok(query_threads(conn, "t.member_hash = ?1", [hash.as_str()])?.into_iter().next())
        })
    }

    /// Threads of the given kinds that `user_id` belongs to, most recently active first.
    pub fn list_threads_for_user(&self, user_id: Uuid, kinds: &[ThreadKind]) -> Result<Vec<Thread>> {
        if kinds.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let filter = format!(
                "t.kind IN ({}) AND EXISTS (
                    SELECT 1 FROM thread_members tm WHERE tm.thread_id = t.id AND tm.user_id = ?1
                 )",
                placeholders(kinds.len(), 1)
            );
            let mut args = vec![user_id.to_string()];
            args.extend(kinds.iter().map(|k| k.as_str().to_string()));
            query_threads(conn, &filter, params_from_iter(args.iter()))
        })
    }

    /// Field-level kind change on the thread owning `hash`, guarded by the current kind.
    /// Returns the number of threads changed (0 or 1).
    pub fn update_thread_kind(
        &self,
        hash: &PairKey,
        from: ThreadKind,
        to: ThreadKind,
        at: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE threads SET kind = ?1, updated_at = ?2 WHERE member_hash = ?3 AND kind = ?4",
                params![to.as_str(), ts(at), hash.as_str(), from.as_str()],
            )?;
            Ok(changed)
        })
    }

    pub fn remove_member(&self, thread_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM thread_members WHERE thread_id = ?1 AND user_id = ?2",
                params![thread_id.to_string(), user_id.to_string()],
            )?;
            Ok(removed > 0)
        })
    }

    // -- Friendships --

    pub fn are_friends(&self, pair: &PairKey) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM friendships WHERE pair_key = ?1",
                    [pair.as_str()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Returns false if the friendship was already recorded.
    pub fn insert_friendship(&self, a: Uuid, b: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let pair = PairKey::new(a, b);
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO friendships (pair_key, user_a, user_b, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![pair.as_str(), a.to_string(), b.to_string(), ts(at)],
            )?;
            Ok(inserted > 0)
        })
    }
}

/// Bump a member's read watermark. A no-op for non-members.
pub(crate) fn set_last_read(
    conn: &Connection,
    thread_id: &str,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE thread_members SET last_read_at = ?1 WHERE thread_id = ?2 AND user_id = ?3",
        params![ts(at), thread_id, user_id],
    )?;
    Ok(())
}

fn insert_thread_row(conn: &Connection, thread: &Thread, skip_on_hash_conflict: bool) -> Result<bool> {
    let sql = if skip_on_hash_conflict {
        "INSERT INTO threads (id, kind, name, avatar, member_hash, last_message_id, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(member_hash) DO NOTHING"
    } else {
        "INSERT INTO threads (id, kind, name, avatar, member_hash, last_message_id, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
    };

    let inserted = conn.execute(
        sql,
        params![
            thread.id.to_string(),
            thread.kind.as_str(),
            thread.name,
            thread.avatar,
            thread.member_hash.as_ref().map(|h| h.as_str().to_string()),
            thread.last_message_id.map(|id| id.to_string()),
            thread.created_by.to_string(),
            ts(thread.created_at),
            ts(thread.updated_at),
        ],
    )?;
    Ok(inserted > 0)
}

fn insert_members(conn: &Connection, thread: &Thread) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO thread_members (thread_id, user_id, role, position, last_read_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, member) in thread.members.iter().enumerate() {
        stmt.execute(params![
            thread.id.to_string(),
            member.user_id.to_string(),
            member.role.as_str(),
            position as i64,
            member.last_read_at.map(ts),
        ])?;
    }
    Ok(())
}

fn map_thread_row(row: &Row<'_>) -> rusqlite::Result<ThreadRow> {
    Ok(ThreadRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        avatar: row.get(3)?,
        member_hash: row.get(4)?,
        last_message_id: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn query_threads(conn: &Connection, filter: &str, params: impl Params) -> Result<Vec<Thread>> {
    let sql = format!(
        "SELECT {} FROM threads t WHERE {} ORDER BY t.updated_at DESC, t.id",
        THREAD_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, map_thread_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Batch-load members for every thread in one query (avoids N+1)
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut members = query_members(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let thread_members = members.remove(&row.id).unwrap_or_default();
            row.into_thread(thread_members)
        })
        .collect())
}

fn query_members(conn: &Connection, thread_ids: &[String]) -> Result<HashMap<String, Vec<ThreadMember>>> {
    let mut grouped: HashMap<String, Vec<ThreadMember>> = HashMap::new();

    for chunk in thread_ids.chunks(MAX_BOUND_IDS) {
        let sql = format!(
            "SELECT thread_id, user_id, role, last_read_at FROM thread_members
             WHERE thread_id IN ({}) ORDER BY thread_id, position",
            placeholders(chunk.len(), 0)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| {
                Ok(MemberRow {
                    thread_id: row.get(0)?,
                    user_id: row.get(1)?,
                    role: row.get(2)?,
                    last_read_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for row in rows {
            grouped.entry(row.thread_id.clone()).or_default().push(row.into_member());
        }
    }
    Ok(grouped)
}
