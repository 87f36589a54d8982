use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS threads (
            id              TEXT PRIMARY KEY,
            kind            TEXT NOT NULL
                            CHECK (kind IN ('direct_stranger', 'direct_friend', 'group')),
            name            TEXT,
            avatar          TEXT,
            -- sorted user-id pair; NULL for groups, so uniqueness only binds direct threads
            member_hash     TEXT UNIQUE,
            last_message_id TEXT,
            created_by      TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_threads_kind
            ON threads(kind);

        CREATE TABLE IF NOT EXISTS thread_members (
            thread_id       TEXT NOT NULL REFERENCES threads(id),
            user_id         TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'member'
                            CHECK (role IN ('member', 'admin')),
            position        INTEGER NOT NULL,
            last_read_at    TEXT,
            PRIMARY KEY (thread_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_thread_members_user
            ON thread_members(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            thread_id       TEXT NOT NULL REFERENCES threads(id),
            sender_id       TEXT NOT NULL,
            content_type    TEXT NOT NULL
                            CHECK (content_type IN ('text', 'file', 'poll', 'schedule')),
            content         TEXT CHECK (content IS NULL OR length(content) <= 2000),
            attachments     TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_thread
            ON messages(thread_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id, created_at);

        CREATE TABLE IF NOT EXISTS message_reads (
            message_id      TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            user_id         TEXT NOT NULL,
            read_at         TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_message_reads_user
            ON message_reads(user_id);

        CREATE TABLE IF NOT EXISTS message_hidden (
            message_id      TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            user_id         TEXT NOT NULL,
            hidden_at       TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS reactions (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id      TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            token           TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            UNIQUE(message_id, token)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);

        CREATE TABLE IF NOT EXISTS friendships (
            pair_key        TEXT PRIMARY KEY,
            user_a          TEXT NOT NULL,
            user_b          TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL,
            kind            TEXT NOT NULL
                            CHECK (kind IN ('friend_request', 'message', 'schedule', 'group', 'system')),
            title           TEXT NOT NULL,
            body            TEXT,
            ref_id          TEXT,
            ref_type        TEXT,
            read            INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_notifications_unread
            ON notifications(user_id, read);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
