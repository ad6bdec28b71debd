//! v002 -- Add columns that older releases did not have.
//!
//! Each column is checked with `PRAGMA table_info` before its `ALTER`, so
//! the step is a no-op on a current schema. Columns are only ever added.
//!
//! Ownership columns added here carry no `REFERENCES` clause: SQLite
//! refuses a non-NULL default on an added foreign-key column while foreign
//! keys are enforced. Account deletion removes owned rows explicitly.

use lorebase_shared::Tenancy;
use rusqlite::Connection;

use super::{column_exists, MigrationReport};
use crate::error::Result;

/// `(table, column, definition)` in the order they are applied.
const COLUMNS: &[(&str, &str, &str)] = &[
    ("users", "email", "TEXT"),
    ("users", "is_admin", "INTEGER NOT NULL DEFAULT 0"),
    ("users", "must_change_password", "INTEGER NOT NULL DEFAULT 0"),
    ("users", "dark_mode", "INTEGER NOT NULL DEFAULT 0"),
    ("users", "last_login", "TEXT"),
    ("chunks", "user_id", "INTEGER NOT NULL DEFAULT 1"),
    ("chunks", "tags", "TEXT"),
    ("chunks", "summary", "TEXT"),
    (
        "chunks",
        "visibility",
        "TEXT NOT NULL DEFAULT 'private' CHECK (visibility IN ('private', 'shared', 'public'))",
    ),
    ("chunks", "shared_with", "TEXT"),
    ("sessions", "user_id", "INTEGER NOT NULL DEFAULT 1"),
    ("sessions", "title", "TEXT"),
    ("chat_messages", "user_id", "INTEGER NOT NULL DEFAULT 1"),
    ("chat_messages", "provider", "TEXT"),
    ("audit_log", "user_id", "INTEGER"),
    ("audit_log", "username", "TEXT"),
    ("watched_folders", "user_id", "INTEGER NOT NULL DEFAULT 1"),
    ("watched_folders", "active", "INTEGER NOT NULL DEFAULT 1"),
    ("watched_folders", "last_scan", "TEXT"),
    ("skills", "user_id", "INTEGER NOT NULL DEFAULT 1"),
    ("skills", "enabled", "INTEGER NOT NULL DEFAULT 1"),
];

pub fn up(conn: &Connection, _tenancy: Tenancy, report: &mut MigrationReport) -> Result<()> {
    for (table, column, definition) in COLUMNS {
        if column_exists(conn, table, column)? {
            continue;
        }
        tracing::info!(table, column, "adding column");
        conn.execute_batch(&format!(
            "ALTER TABLE {table} ADD COLUMN {column} {definition};"
        ))?;
        report.columns_added.push(format!("{table}.{column}"));
    }
    Ok(())
}
