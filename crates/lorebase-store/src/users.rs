//! Account records and password handling.

use std::sync::OnceLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use lorebase_shared::constants::INITIAL_PASSWORD_LEN;
use lorebase_shared::UserId;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::timestamp;

/// Stored in place of a hash for accounts that cannot log in.
pub(crate) const NO_LOGIN_HASH: &str = "!";

/// Tenant-owned tables. Listed explicitly because tables upgraded from
/// older layouts have no foreign key to cascade through.
const OWNED_TABLES: &[&str] = &[
    "chunks",
    "chat_messages",
    "sessions",
    "watched_folders",
    "skills",
    "session_tokens",
];

const USER_COLUMNS: &str = "id, username, email, is_admin, must_change_password, dark_mode, created_at, last_login";

/// Argon2id PHC string with a fresh random salt.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| StoreError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

/// Hash checked when there is no real one to check against, so unknown and
/// no-login accounts cost the same as a wrong password.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("lorebase-unknown-account").ok())
        .as_deref()
}

fn spend_verify_cost(password: &str) {
    if let Some(parsed) = dummy_hash().and_then(|h| PasswordHash::new(h).ok()) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
    }
}

/// `false` for malformed hashes, including [`NO_LOGIN_HASH`].
fn verify_hash(stored: &str, password: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => {
            spend_verify_cost(password);
            false
        }
    }
}

pub(crate) fn generate_password() -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(INITIAL_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create an account. A taken username is a [`StoreError::Conflict`].
    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        is_admin: bool,
    ) -> Result<User> {
        let hash = hash_password(password)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, password_hash, email, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, hash, email, is_admin, timestamp::now_sql()],
        )
        .map_err(|e| StoreError::conflict_on_unique(e, "username already exists"))?;

        let id = UserId(conn.last_insert_rowid());
        tracing::info!(user_id = %id, username, "created user");
        drop(conn);
        self.get_user(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                row_to_user,
            )
            .map_err(StoreError::not_found_on_empty)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                row_to_user,
            )
            .map_err(StoreError::not_found_on_empty)
    }

    /// All accounts, oldest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"))?;
        let rows = stmt.query_map([], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Check a password. Returns the account on success, `None` on a wrong
    /// password or unknown username. Lockout is the caller's concern.
    pub fn verify_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        let stored: Option<(i64, String)> = self
            .conn()?
            .query_row(
                "SELECT id, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match stored {
            Some((id, hash)) if verify_hash(&hash, password) => self.get_user(UserId(id)).map(Some),
            Some(_) => Ok(None),
            None => {
                spend_verify_cost(password);
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn record_login(&self, id: UserId) -> Result<()> {
        let affected = self.conn()?.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![timestamp::to_sql(&Utc::now()), id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Replace the password and clear the forced-change flag.
    pub fn change_password(&self, id: UserId, new_password: &str) -> Result<()> {
        let hash = hash_password(new_password)?;
        let affected = self.conn()?.execute(
            "UPDATE users SET password_hash = ?1, must_change_password = 0 WHERE id = ?2",
            params![hash, id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::info!(user_id = %id, "password changed");
        Ok(())
    }

    pub fn set_dark_mode(&self, id: UserId, enabled: bool) -> Result<()> {
        let affected = self.conn()?.execute(
            "UPDATE users SET dark_mode = ?1 WHERE id = ?2",
            params![enabled, id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn set_admin(&self, id: UserId, is_admin: bool) -> Result<()> {
        let affected = self.conn()?.execute(
            "UPDATE users SET is_admin = ?1 WHERE id = ?2",
            params![is_admin, id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an account and every row it owns, atomically.
    pub fn delete_user(&self, id: UserId) -> Result<()> {
        self.write_tx(|tx| {
            for table in OWNED_TABLES {
                tx.execute(
                    &format!("DELETE FROM {table} WHERE user_id = ?1"),
                    params![id.0],
                )?;
            }
            let affected = tx.execute("DELETE FROM users WHERE id = ?1", params![id.0])?;
            if affected == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })?;
        tracing::info!(user_id = %id, "deleted user and owned records");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        is_admin: row.get(3)?,
        must_change_password: row.get(4)?,
        dark_mode: row.get(5)?,
        created_at: timestamp::column(row, 6)?,
        last_login: timestamp::column_opt(row, 7)?,
    })
}
