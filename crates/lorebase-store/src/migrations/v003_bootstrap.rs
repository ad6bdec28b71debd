//! v003 -- One-time data bootstrap.
//!
//! - A database with no accounts gets the non-interactive default account
//!   (id 1), which owns everything written by single-user releases.
//! - In multi-tenant mode, a database without an administrator gets one
//!   with a random password that must be changed at first login. The
//!   password is handed back once through the report.
//! - Messages written before the `sessions` table existed get a session
//!   row each (owner, first and last message time).

use lorebase_shared::constants::{ADMIN_ACCOUNT_NAME, DEFAULT_ACCOUNT_ID, DEFAULT_ACCOUNT_NAME};
use lorebase_shared::Tenancy;
use rusqlite::{params, Connection, OptionalExtension};

use super::MigrationReport;
use crate::error::Result;
use crate::models::InitialAdmin;
use crate::timestamp;
use crate::users::{generate_password, hash_password, NO_LOGIN_HASH};

pub fn up(conn: &Connection, tenancy: Tenancy, report: &mut MigrationReport) -> Result<()> {
    ensure_default_account(conn, report)?;
    if tenancy == Tenancy::Multi {
        ensure_admin_account(conn, report)?;
    }
    backfill_sessions(conn, report)?;
    Ok(())
}

fn ensure_default_account(conn: &Connection, report: &mut MigrationReport) -> Result<()> {
    let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if users > 0 {
        return Ok(());
    }

    conn.execute(
        "INSERT INTO users (id, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            DEFAULT_ACCOUNT_ID,
            DEFAULT_ACCOUNT_NAME,
            NO_LOGIN_HASH,
            timestamp::now_sql()
        ],
    )?;
    tracing::info!(username = DEFAULT_ACCOUNT_NAME, "created default account");
    report.accounts_created.push(DEFAULT_ACCOUNT_NAME.to_string());
    Ok(())
}

fn ensure_admin_account(conn: &Connection, report: &mut MigrationReport) -> Result<()> {
    let admins: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_admin = 1",
        [],
        |row| row.get(0),
    )?;
    if admins > 0 {
        return Ok(());
    }

    let taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM users WHERE username = ?1",
            params![ADMIN_ACCOUNT_NAME],
            |row| row.get(0),
        )
        .optional()?;
    if taken.is_some() {
        tracing::warn!(
            username = ADMIN_ACCOUNT_NAME,
            "no administrator exists and the admin username is taken; promote an account manually"
        );
        return Ok(());
    }

    let password = generate_password();
    conn.execute(
        "INSERT INTO users (username, password_hash, is_admin, must_change_password, created_at)
         VALUES (?1, ?2, 1, 1, ?3)",
        params![
            ADMIN_ACCOUNT_NAME,
            hash_password(&password)?,
            timestamp::now_sql()
        ],
    )?;

    tracing::warn!(
        username = ADMIN_ACCOUNT_NAME,
        "created administrator account with a generated password; it must be changed at first login"
    );
    report.accounts_created.push(ADMIN_ACCOUNT_NAME.to_string());
    report.initial_admin = Some(InitialAdmin {
        username: ADMIN_ACCOUNT_NAME.to_string(),
        password,
    });
    Ok(())
}

fn backfill_sessions(conn: &Connection, report: &mut MigrationReport) -> Result<()> {
    let inserted = conn.execute(
        "INSERT INTO sessions (id, user_id, title, created_at, last_message_at)
         SELECT m.session_id, MIN(m.user_id), NULL, MIN(m.created_at), MAX(m.created_at)
         FROM chat_messages m
         WHERE NOT EXISTS (SELECT 1 FROM sessions s WHERE s.id = m.session_id)
         GROUP BY m.session_id",
        [],
    )?;
    if inserted > 0 {
        tracing::info!(sessions = inserted, "backfilled session metadata");
    }
    report.sessions_backfilled += inserted;
    Ok(())
}
