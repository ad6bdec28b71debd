//! Database migration runner.
//!
//! The schema carries no version number: the presence of tables and columns
//! is the version signal. Every open replays the full ordered list of
//! steps below inside ONE immediate transaction. Each step is idempotent on
//! its own, so a current database passes through unchanged, and an error in
//! any step rolls the whole batch back.

pub mod v001_tables;
pub mod v002_columns;
pub mod v003_bootstrap;
pub mod v004_folder_rebuild;
pub mod v005_indexes;

use lorebase_shared::Tenancy;
use rusqlite::{Connection, TransactionBehavior};

use crate::error::{Result, StoreError};
use crate::models::InitialAdmin;

/// One named schema-change step.
pub struct MigrationStep {
    pub name: &'static str,
    pub apply: fn(&Connection, Tenancy, &mut MigrationReport) -> Result<()>,
}

/// Steps in dependency order: tables, then columns on pre-existing tables,
/// then data bootstrap (which needs the columns), then table rebuilds (whose
/// foreign keys need the bootstrap accounts), then indexes.
pub const STEPS: &[MigrationStep] = &[
    MigrationStep {
        name: "v001_tables",
        apply: v001_tables::up,
    },
    MigrationStep {
        name: "v002_columns",
        apply: v002_columns::up,
    },
    MigrationStep {
        name: "v003_bootstrap",
        apply: v003_bootstrap::up,
    },
    MigrationStep {
        name: "v004_folder_rebuild",
        apply: v004_folder_rebuild::up,
    },
    MigrationStep {
        name: "v005_indexes",
        apply: v005_indexes::up,
    },
];

/// What a migration run changed. Empty on an already-current database.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub steps: Vec<&'static str>,
    /// `table.column` for every column added to a pre-existing table.
    pub columns_added: Vec<String>,
    pub accounts_created: Vec<String>,
    /// Session rows created for messages written before sessions existed.
    pub sessions_backfilled: usize,
    /// Tables copied into the current layout to drop an outdated constraint.
    pub tables_rebuilt: Vec<String>,
    pub initial_admin: Option<InitialAdmin>,
}

impl MigrationReport {
    /// `true` when the run found nothing to change.
    pub fn is_noop(&self) -> bool {
        self.columns_added.is_empty()
            && self.accounts_created.is_empty()
            && self.sessions_backfilled == 0
            && self.tables_rebuilt.is_empty()
    }
}

/// Bring the database up to the current schema.
pub fn run_migrations(conn: &mut Connection, tenancy: Tenancy) -> Result<MigrationReport> {
    run_steps(conn, tenancy, STEPS)
}

pub(crate) fn run_steps(
    conn: &mut Connection,
    tenancy: Tenancy,
    steps: &[MigrationStep],
) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    for step in steps {
        tracing::debug!(step = step.name, "applying migration step");
        (step.apply)(&tx, tenancy, &mut report).map_err(|e| {
            tracing::error!(step = step.name, error = %e, "migration failed, rolling back");
            StoreError::Migration(format!("{}: {e}", step.name))
        })?;
        report.steps.push(step.name);
    }

    tx.commit()?;

    tracing::info!(
        steps = report.steps.len(),
        columns_added = report.columns_added.len(),
        accounts_created = report.accounts_created.len(),
        sessions_backfilled = report.sessions_backfilled,
        tables_rebuilt = report.tables_rebuilt.len(),
        "database schema is current"
    );
    Ok(report)
}

/// `PRAGMA table_info` lookup. A missing table has no columns.
pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn open_raw() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("raw.db")).unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        (dir, conn)
    }

    fn schema_snapshot(conn: &Connection) -> Vec<(String, String)> {
        let mut stmt = conn
            .prepare(
                "SELECT name, COALESCE(sql, '') FROM sqlite_master
                 WHERE name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap()
    }

    fn row_counts(conn: &Connection) -> Vec<(String, i64)> {
        [
            "users",
            "chunks",
            "sessions",
            "chat_messages",
            "audit_log",
            "watched_folders",
            "skills",
            "session_tokens",
            "failed_logins",
        ]
        .iter()
        .map(|t| {
            let n: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {t}"), [], |r| r.get(0))
                .unwrap();
            (t.to_string(), n)
        })
        .collect()
    }

    #[test]
    fn three_runs_converge_to_identical_schema_and_rows() {
        let (_dir, mut conn) = open_raw();

        let first = run_migrations(&mut conn, Tenancy::Multi).unwrap();
        assert_eq!(first.steps.len(), STEPS.len());
        assert_eq!(first.accounts_created, vec!["local", "admin"]);
        assert!(first.initial_admin.is_some());

        let schema = schema_snapshot(&conn);
        let counts = row_counts(&conn);

        for _ in 0..2 {
            let again = run_migrations(&mut conn, Tenancy::Multi).unwrap();
            assert!(again.is_noop(), "{again:?}");
            assert!(again.initial_admin.is_none());
            assert_eq!(schema_snapshot(&conn), schema);
            assert_eq!(row_counts(&conn), counts);
        }
    }

    fn failing_step(_: &Connection, _: Tenancy, _: &mut MigrationReport) -> Result<()> {
        Err(StoreError::Migration("boom".into()))
    }

    #[test]
    fn failure_rolls_back_every_step() {
        let (_dir, mut conn) = open_raw();
        conn.execute_batch("CREATE TABLE chunks (id INTEGER PRIMARY KEY, source TEXT NOT NULL, text TEXT NOT NULL, embedding BLOB NOT NULL, created_at TEXT NOT NULL);")
            .unwrap();
        let before = schema_snapshot(&conn);

        let mut steps: Vec<MigrationStep> = STEPS
            .iter()
            .map(|s| MigrationStep {
                name: s.name,
                apply: s.apply,
            })
            .collect();
        steps.push(MigrationStep {
            name: "v999_broken",
            apply: failing_step,
        });

        let err = run_steps(&mut conn, Tenancy::Single, &steps).unwrap_err();
        assert!(matches!(err, StoreError::Migration(ref m) if m.starts_with("v999_broken")));
        assert_eq!(schema_snapshot(&conn), before);
        assert!(!column_exists(&conn, "chunks", "visibility").unwrap());
    }

    /// Layout written by the single-user releases: no accounts on content
    /// tables, no sessions table, no visibility.
    const LEGACY_SQL: &str = r#"
CREATE TABLE users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE TABLE chunks (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    source     TEXT NOT NULL,
    text       TEXT NOT NULL,
    embedding  BLOB NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE chat_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    role       TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE watched_folders (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE
);
"#;

    #[test]
    fn legacy_layout_is_upgraded_preserving_rows() {
        let (_dir, mut conn) = open_raw();
        conn.execute_batch(LEGACY_SQL).unwrap();

        let blob = lorebase_shared::embedding::encode(&[0.25, -0.0, 3.5]);
        conn.execute(
            "INSERT INTO chunks (source, text, embedding, created_at) VALUES (?1, ?2, ?3, ?4)",
            params!["notes.md", "legacy text", blob, "2023-03-04 05:06:07"],
        )
        .unwrap();
        conn.execute_batch(
            "INSERT INTO chat_messages (session_id, role, content, created_at) VALUES
                ('s-old', 'user', 'hello', '2023-03-04 05:06:08'),
                ('s-old', 'assistant', 'hi there', '2023-03-04 05:06:09');
             INSERT INTO watched_folders (path) VALUES ('/srv/docs');",
        )
        .unwrap();

        let report = run_migrations(&mut conn, Tenancy::Single).unwrap();
        assert!(report.columns_added.contains(&"chunks.visibility".to_string()));
        assert!(report.columns_added.contains(&"chat_messages.user_id".to_string()));
        assert_eq!(report.accounts_created, vec!["local"]);
        assert_eq!(report.sessions_backfilled, 1);

        let (source, text, stored, created, owner, vis): (
            String,
            String,
            Vec<u8>,
            String,
            i64,
            String,
        ) = conn
            .query_row(
                "SELECT source, text, embedding, created_at, user_id, visibility FROM chunks",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
            )
            .unwrap();
        assert_eq!(source, "notes.md");
        assert_eq!(text, "legacy text");
        assert_eq!(stored, blob);
        assert_eq!(created, "2023-03-04 05:06:07");
        assert_eq!(owner, 1);
        assert_eq!(vis, "private");

        let contents: Vec<String> = conn
            .prepare("SELECT content FROM chat_messages ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(contents, vec!["hello", "hi there"]);

        let (owner, first, last): (i64, String, String) = conn
            .query_row(
                "SELECT user_id, created_at, last_message_at FROM sessions WHERE id = 's-old'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(owner, 1);
        assert_eq!(first, "2023-03-04 05:06:08");
        assert_eq!(last, "2023-03-04 05:06:09");

        let folder: (String, i64) = conn
            .query_row("SELECT path, active FROM watched_folders", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(folder, ("/srv/docs".to_string(), 1));

        // The legacy path-only UNIQUE is gone; paths are unique per owner.
        assert_eq!(report.tables_rebuilt, vec!["watched_folders"]);
        conn.execute(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (2, 'second', '!', 'x')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO watched_folders (user_id, path) VALUES (2, '/srv/docs')",
            [],
        )
        .unwrap();
        assert!(conn
            .execute(
                "INSERT INTO watched_folders (user_id, path) VALUES (1, '/srv/docs')",
                [],
            )
            .is_err());
        let legacy_id: i64 = conn
            .query_row(
                "SELECT id FROM watched_folders WHERE user_id = 1 AND path = '/srv/docs'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(legacy_id, 1);

        // And the upgraded file is now current.
        let again = run_migrations(&mut conn, Tenancy::Single).unwrap();
        assert!(again.is_noop(), "{again:?}");
    }

    #[test]
    fn column_exists_reports_missing_tables_as_empty() {
        let (_dir, conn) = open_raw();
        assert!(!column_exists(&conn, "nope", "id").unwrap());
        conn.execute_batch("CREATE TABLE t (a TEXT)").unwrap();
        assert!(column_exists(&conn, "t", "a").unwrap());
        assert!(!column_exists(&conn, "t", "b").unwrap());
    }
}
