//! v001 -- Create every table that does not exist yet, in its current shape.
//!
//! Tables left over from older releases are not touched here; missing
//! columns on those are added by `v002_columns`.

use lorebase_shared::Tenancy;
use rusqlite::Connection;

use super::MigrationReport;
use crate::error::Result;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    username             TEXT NOT NULL UNIQUE,
    password_hash        TEXT NOT NULL,            -- Argon2id PHC string, '!' = no login
    email                TEXT,
    is_admin             INTEGER NOT NULL DEFAULT 0,
    must_change_password INTEGER NOT NULL DEFAULT 0,
    dark_mode            INTEGER NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,            -- RFC-3339
    last_login           TEXT
);

-- ----------------------------------------------------------------
-- Chunks (ingested text + embedding)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chunks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL DEFAULT 1,
    source      TEXT NOT NULL,
    text        TEXT NOT NULL,
    embedding   BLOB NOT NULL,                     -- little-endian f32 x N
    tags        TEXT,                              -- comma-separated
    summary     TEXT,
    visibility  TEXT NOT NULL DEFAULT 'private'
                CHECK (visibility IN ('private', 'shared', 'public')),
    shared_with TEXT,                              -- comma-separated user ids
    created_at  TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Chat sessions and messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    id              TEXT PRIMARY KEY NOT NULL,
    user_id         INTEGER NOT NULL DEFAULT 1,
    title           TEXT,
    created_at      TEXT NOT NULL,
    last_message_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    user_id    INTEGER NOT NULL DEFAULT 1,
    role       TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content    TEXT NOT NULL,
    provider   TEXT CHECK (provider IN ('local', 'cloud')),
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Audit log (kept after the acting user is deleted)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS audit_log (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    operation  TEXT NOT NULL,
    details    TEXT NOT NULL DEFAULT '',
    user_id    INTEGER,
    username   TEXT
);

-- ----------------------------------------------------------------
-- Watched folders and skills
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS watched_folders (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id   INTEGER NOT NULL DEFAULT 1,
    path      TEXT NOT NULL,
    active    INTEGER NOT NULL DEFAULT 1,
    last_scan TEXT,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS skills (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL DEFAULT 1,
    name       TEXT NOT NULL,
    path       TEXT NOT NULL,
    enabled    INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Authentication
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS session_tokens (
    token      TEXT PRIMARY KEY NOT NULL,          -- hex, 32 random bytes
    user_id    INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS failed_logins (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    username     TEXT NOT NULL,
    attempted_at TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection, _tenancy: Tenancy, _report: &mut MigrationReport) -> Result<()> {
    conn.execute_batch(UP_SQL)?;
    Ok(())
}
