//! User-registered skill plugins. The store only keeps the registry; running
//! a skill is the host application's business.

use chrono::{SubsecRound, Utc};
use lorebase_shared::UserId;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Skill;
use crate::timestamp;

const SKILL_COLUMNS: &str = "id, user_id, name, path, enabled, created_at";

impl Database {
    pub fn add_skill(&self, owner: UserId, name: &str, path: &str) -> Result<Skill> {
        let created_at = Utc::now().trunc_subsecs(6);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO skills (user_id, name, path, enabled, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![owner.0, name, path, timestamp::to_sql(&created_at)],
        )?;
        tracing::info!(owner = %owner, name, "registered skill");
        Ok(Skill {
            id: conn.last_insert_rowid(),
            owner,
            name: name.to_string(),
            path: path.to_string(),
            enabled: true,
            created_at,
        })
    }

    pub fn list_skills(&self, owner: UserId) -> Result<Vec<Skill>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SKILL_COLUMNS} FROM skills WHERE user_id = ?1 ORDER BY name, id"
        ))?;
        let rows = stmt.query_map(params![owner.0], row_to_skill)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_skill(&self, id: i64) -> Result<Skill> {
        self.conn()?
            .query_row(
                &format!("SELECT {SKILL_COLUMNS} FROM skills WHERE id = ?1"),
                params![id],
                row_to_skill,
            )
            .map_err(StoreError::not_found_on_empty)
    }

    pub fn set_skill_enabled(&self, owner: UserId, id: i64, enabled: bool) -> Result<()> {
        self.write_tx(|tx| {
            check_skill_owner(tx, owner, id)?;
            tx.execute(
                "UPDATE skills SET enabled = ?1 WHERE id = ?2",
                params![enabled, id],
            )?;
            Ok(())
        })
    }

    pub fn delete_skill(&self, owner: UserId, id: i64) -> Result<()> {
        self.write_tx(|tx| {
            check_skill_owner(tx, owner, id)?;
            tx.execute("DELETE FROM skills WHERE id = ?1", params![id])?;
            Ok(())
        })
    }
}

fn check_skill_owner(conn: &rusqlite::Connection, owner: UserId, id: i64) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM skills WHERE id = ?1",
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

fn row_to_skill(row: &rusqlite::Row<'_>) -> rusqlite::Result<Skill> {
    Ok(Skill {
        id: row.get(0)?,
        owner: UserId(row.get(1)?),
        name: row.get(2)?,
        path: row.get(3)?,
        enabled: row.get(4)?,
        created_at: timestamp::column(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{add_user, open_temp};
    use lorebase_shared::Tenancy;

    #[test]
    fn register_and_list() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");

        let wc = db.add_skill(alice, "wc", "/usr/bin/wc").unwrap();
        db.add_skill(alice, "grep", "/usr/bin/grep").unwrap();
        db.add_skill(bob, "jq", "/usr/bin/jq").unwrap();

        let names: Vec<_> = db
            .list_skills(alice)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["grep", "wc"]);
        assert_eq!(db.get_skill(wc.id).unwrap(), wc);
        assert!(matches!(db.get_skill(999), Err(StoreError::NotFound)));
    }

    #[test]
    fn only_owner_toggles_or_deletes() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let skill = db.add_skill(alice, "wc", "/usr/bin/wc").unwrap();

        assert!(matches!(
            db.set_skill_enabled(bob, skill.id, false),
            Err(StoreError::AccessDenied)
        ));
        assert!(matches!(
            db.delete_skill(bob, skill.id),
            Err(StoreError::AccessDenied)
        ));

        db.set_skill_enabled(alice, skill.id, false).unwrap();
        assert!(!db.get_skill(skill.id).unwrap().enabled);

        db.delete_skill(alice, skill.id).unwrap();
        assert!(matches!(
            db.delete_skill(alice, skill.id),
            Err(StoreError::NotFound)
        ));
    }
}
