//! v004 -- Rebuild `watched_folders` when an older layout made `path`
//! unique on its own.
//!
//! Single-user releases declared `path TEXT NOT NULL UNIQUE`. A table-level
//! constraint cannot be dropped in SQLite, so the table is copied into the
//! current layout (unique per owner, enforced by the v005 index) with ids
//! and every column preserved. A current table is left untouched.

use lorebase_shared::Tenancy;
use rusqlite::Connection;

use super::MigrationReport;
use crate::error::Result;

const REBUILD_SQL: &str = r#"
CREATE TABLE watched_folders_rebuild (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id   INTEGER NOT NULL DEFAULT 1,
    path      TEXT NOT NULL,
    active    INTEGER NOT NULL DEFAULT 1,
    last_scan TEXT,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);
INSERT INTO watched_folders_rebuild (id, user_id, path, active, last_scan)
    SELECT id, user_id, path, active, last_scan FROM watched_folders;
DROP TABLE watched_folders;
ALTER TABLE watched_folders_rebuild RENAME TO watched_folders;
"#;

pub fn up(conn: &Connection, _tenancy: Tenancy, report: &mut MigrationReport) -> Result<()> {
    if !path_unique_alone(conn)? {
        return Ok(());
    }

    let rows: i64 = conn.query_row("SELECT COUNT(*) FROM watched_folders", [], |row| row.get(0))?;
    tracing::info!(rows, "rebuilding watched_folders for per-owner path uniqueness");
    conn.execute_batch(REBUILD_SQL)?;
    report.tables_rebuilt.push("watched_folders".to_string());
    Ok(())
}

/// `true` when some unique index on `watched_folders` covers only `path`.
fn path_unique_alone(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare("PRAGMA index_list(watched_folders)")?;
    let unique_indexes = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, bool>(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (name, unique) in unique_indexes {
        if !unique {
            continue;
        }
        let mut info = conn.prepare(&format!("PRAGMA index_info(\"{name}\")"))?;
        let columns = info
            .query_map([], |row| row.get::<_, Option<String>>(2))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if columns == [Some("path".to_string())] {
            return Ok(true);
        }
    }
    Ok(false)
}
