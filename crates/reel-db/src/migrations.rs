use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                open_id         TEXT NOT NULL UNIQUE,
                name            TEXT,
                email           TEXT,
                login_method    TEXT,
                role            TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                last_signed_in  TEXT NOT NULL
            );

            CREATE TABLE telegram_sessions (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                auth_token          TEXT NOT NULL UNIQUE,
                telegram_user_id    INTEGER,
                telegram_username   TEXT,
                user_id             INTEGER REFERENCES users(id),
                verified            INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                expires_at          TEXT NOT NULL,
                CHECK (verified = 0 OR (telegram_user_id IS NOT NULL AND user_id IS NOT NULL))
            );

            CREATE INDEX idx_telegram_sessions_expires
                ON telegram_sessions(expires_at);

            CREATE TABLE videos (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                youtube_id      TEXT NOT NULL,
                title           TEXT NOT NULL,
                description     TEXT,
                thumbnail_url   TEXT,
                duration        INTEGER,
                file_key        TEXT NOT NULL,
                file_url        TEXT NOT NULL,
                file_size       INTEGER,
                mime_type       TEXT,
                status          TEXT NOT NULL DEFAULT 'downloading'
                                CHECK (status IN ('downloading', 'ready', 'failed')),
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_videos_user
                ON videos(user_id, created_at);

            CREATE TABLE download_queue (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                youtube_url     TEXT NOT NULL,
                youtube_id      TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'processing', 'completed', 'failed')),
                error_message   TEXT,
                video_id        INTEGER REFERENCES videos(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_download_queue_status
                ON download_queue(status, created_at);

            CREATE INDEX idx_download_queue_user
                ON download_queue(user_id, youtube_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
