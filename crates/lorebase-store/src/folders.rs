//! Directories watched for automatic ingestion.

use chrono::{DateTime, Utc};
use lorebase_shared::UserId;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::WatchedFolder;
use crate::timestamp;

const FOLDER_COLUMNS: &str = "id, user_id, path, active, last_scan";

impl Database {
    /// Register `path` for `owner`. Watching the same path twice is a
    /// [`StoreError::Conflict`]; an unknown owner is [`StoreError::NotFound`].
    pub fn add_watched_folder(&self, owner: UserId, path: &str) -> Result<WatchedFolder> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO watched_folders (user_id, path, active) VALUES (?1, ?2, 1)",
            params![owner.0, path],
        )
        .map_err(|e| StoreError::conflict_on_unique(e, "folder already watched"))?;
        tracing::info!(owner = %owner, path, "watching folder");
        Ok(WatchedFolder {
            id: conn.last_insert_rowid(),
            owner,
            path: path.to_string(),
            active: true,
            last_scan: None,
        })
    }

    pub fn list_watched_folders(&self, owner: UserId) -> Result<Vec<WatchedFolder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FOLDER_COLUMNS} FROM watched_folders WHERE user_id = ?1 ORDER BY path"
        ))?;
        let rows = stmt.query_map(params![owner.0], row_to_folder)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Active folders across every account, for the scanner.
    pub fn list_active_watched_folders(&self) -> Result<Vec<WatchedFolder>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {FOLDER_COLUMNS} FROM watched_folders WHERE active = 1 ORDER BY id"
        ))?;
        let rows = stmt.query_map([], row_to_folder)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn set_folder_active(&self, owner: UserId, id: i64, active: bool) -> Result<()> {
        self.write_tx(|tx| {
            check_folder_owner(tx, owner, id)?;
            tx.execute(
                "UPDATE watched_folders SET active = ?1 WHERE id = ?2",
                params![active, id],
            )?;
            Ok(())
        })
    }

    pub fn mark_folder_scanned(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let n = self.conn()?.execute(
            "UPDATE watched_folders SET last_scan = ?1 WHERE id = ?2",
            params![timestamp::to_sql(&at), id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn remove_watched_folder(&self, owner: UserId, id: i64) -> Result<()> {
        self.write_tx(|tx| {
            check_folder_owner(tx, owner, id)?;
            tx.execute("DELETE FROM watched_folders WHERE id = ?1", params![id])?;
            tracing::info!(owner = %owner, id, "stopped watching folder");
            Ok(())
        })
    }
}

fn check_folder_owner(conn: &rusqlite::Connection, owner: UserId, id: i64) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM watched_folders WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        None => Err(StoreError::NotFound),
        Some(uid) if uid != owner.0 => Err(StoreError::AccessDenied),
        Some(_) => Ok(()),
    }
}

fn row_to_folder(row: &rusqlite::Row<'_>) -> rusqlite::Result<WatchedFolder> {
    Ok(WatchedFolder {
        id: row.get(0)?,
        owner: UserId(row.get(1)?),
        path: row.get(2)?,
        active: row.get(3)?,
        last_scan: timestamp::column_opt(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{add_user, open_temp};
    use chrono::TimeZone;
    use lorebase_shared::Tenancy;

    #[test]
    fn add_list_and_conflict() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");

        db.add_watched_folder(alice, "/notes").unwrap();
        db.add_watched_folder(alice, "/docs").unwrap();
        db.add_watched_folder(bob, "/notes").unwrap();

        assert!(matches!(
            db.add_watched_folder(alice, "/notes"),
            Err(StoreError::Conflict(_))
        ));

        let paths: Vec<_> = db
            .list_watched_folders(alice)
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["/docs", "/notes"]);
        assert_eq!(db.list_active_watched_folders().unwrap().len(), 3);
    }

    #[test]
    fn unknown_owner_is_not_found() {
        let (_dir, db) = open_temp(Tenancy::Single);
        assert!(matches!(
            db.add_watched_folder(UserId(999), "/x"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn owner_only_changes() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let folder = db.add_watched_folder(alice, "/notes").unwrap();

        assert!(matches!(
            db.set_folder_active(bob, folder.id, false),
            Err(StoreError::AccessDenied)
        ));
        assert!(matches!(
            db.remove_watched_folder(bob, folder.id),
            Err(StoreError::AccessDenied)
        ));
        assert!(matches!(
            db.remove_watched_folder(alice, 999),
            Err(StoreError::NotFound)
        ));

        db.set_folder_active(alice, folder.id, false).unwrap();
        assert!(db.list_active_watched_folders().unwrap().is_empty());

        db.remove_watched_folder(alice, folder.id).unwrap();
        assert!(db.list_watched_folders(alice).unwrap().is_empty());
    }

    #[test]
    fn scan_time_is_recorded() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let alice = add_user(&db, "alice");
        let folder = db.add_watched_folder(alice, "/notes").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 8, 30, 0).unwrap();

        db.mark_folder_scanned(folder.id, at).unwrap();
        let listed = db.list_watched_folders(alice).unwrap();
        assert_eq!(listed[0].last_scan, Some(at));
        assert!(matches!(
            db.mark_folder_scanned(999, at),
            Err(StoreError::NotFound)
        ));
    }
}
