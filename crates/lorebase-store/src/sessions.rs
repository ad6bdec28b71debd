//! Chat sessions and the append-only message ledger.
//!
//! Sessions are single-owner. Every read or mutation of a session's
//! contents checks ownership first, before any message row is touched, so a
//! non-owner learns nothing about another user's conversation.

use chrono::{SubsecRound, Utc};
use lorebase_shared::constants::SESSION_TITLE_MAX_CHARS;
use lorebase_shared::{ProviderTier, Role, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ChatMessage, Session};
use crate::timestamp;

/// Fresh identifier for a new conversation.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

impl Database {
    /// Append a message and create or touch its session in the same
    /// transaction.
    ///
    /// The session upsert only updates rows owned by `owner`; appending to a
    /// session that belongs to someone else fails with
    /// [`StoreError::AccessDenied`] and nothing is written. `provider` is
    /// recorded for assistant turns only.
    pub fn save_message(
        &self,
        owner: UserId,
        session_id: &str,
        role: Role,
        content: &str,
        provider: Option<ProviderTier>,
    ) -> Result<ChatMessage> {
        let created_at = Utc::now().trunc_subsecs(6);
        let ts = timestamp::to_sql(&created_at);
        let provider = match role {
            Role::Assistant => provider,
            Role::User => None,
        };
        let title = match role {
            Role::User => derive_title(content),
            Role::Assistant => None,
        };

        let message = self.write_tx(|tx| {
            let touched = tx.execute(
                "INSERT INTO sessions (id, user_id, title, created_at, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     last_message_at = MAX(sessions.last_message_at, excluded.last_message_at),
                     title = COALESCE(sessions.title, excluded.title)
                 WHERE sessions.user_id = excluded.user_id",
                params![session_id, owner.0, title, ts],
            )?;
            if touched == 0 {
                tracing::warn!(user_id = %owner, session_id, "denied append to a session owned by another user");
                return Err(StoreError::AccessDenied);
            }

            tx.execute(
                "INSERT INTO chat_messages (session_id, user_id, role, content, provider, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session_id,
                    owner.0,
                    role.as_str(),
                    content,
                    provider.map(|p| p.as_str()),
                    ts
                ],
            )?;

            Ok(ChatMessage {
                id: tx.last_insert_rowid(),
                session_id: session_id.to_string(),
                owner,
                role,
                content: content.to_string(),
                provider,
                created_at,
            })
        })?;

        tracing::debug!(user_id = %owner, session_id, message_id = message.id, "saved message");
        Ok(message)
    }

    /// Sessions owned by `owner`, most recent activity first.
    pub fn get_user_sessions(&self, owner: UserId) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.user_id, s.title, s.created_at, s.last_message_at,
                    (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id)
             FROM sessions s
             WHERE s.user_id = ?1
             ORDER BY s.last_message_at DESC, s.created_at DESC",
        )?;
        let rows = stmt.query_map(params![owner.0], row_to_session)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Owner of a session, or [`StoreError::NotFound`].
    pub fn get_session_owner(&self, session_id: &str) -> Result<UserId> {
        let conn = self.conn()?;
        session_owner(&conn, session_id)
    }

    /// Messages of a session in creation order, for its owner only.
    pub fn get_session_messages(&self, user: UserId, session_id: &str) -> Result<Vec<ChatMessage>> {
        let conn = self.conn()?;
        check_owner(&conn, session_id, user)?;

        let mut stmt = conn.prepare(
            "SELECT id, session_id, user_id, role, content, provider, created_at
             FROM chat_messages
             WHERE session_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn rename_session(&self, user: UserId, session_id: &str, title: &str) -> Result<()> {
        self.write_tx(|tx| {
            check_owner(tx, session_id, user)?;
            tx.execute(
                "UPDATE sessions SET title = ?1 WHERE id = ?2",
                params![title, session_id],
            )?;
            Ok(())
        })
    }

    /// Delete a session and all of its messages.
    pub fn delete_session(&self, user: UserId, session_id: &str) -> Result<usize> {
        let removed = self.write_tx(|tx| {
            check_owner(tx, session_id, user)?;
            let removed = tx.execute(
                "DELETE FROM chat_messages WHERE session_id = ?1",
                params![session_id],
            )?;
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(removed)
        })?;
        tracing::info!(user_id = %user, session_id, messages = removed, "deleted session");
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session_owner(conn: &Connection, session_id: &str) -> Result<UserId> {
    conn.query_row(
        "SELECT user_id FROM sessions WHERE id = ?1",
        params![session_id],
        |row| row.get(0),
    )
    .optional()?
    .map(UserId)
    .ok_or(StoreError::NotFound)
}

fn check_owner(conn: &Connection, session_id: &str, user: UserId) -> Result<()> {
    let owner = session_owner(conn, session_id)?;
    if owner != user {
        tracing::warn!(user_id = %user, session_id, "denied access to a session owned by another user");
        return Err(StoreError::AccessDenied);
    }
    Ok(())
}

/// First line of the opening message, trimmed and cut to a title length.
fn derive_title(content: &str) -> Option<String> {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(line.chars().take(SESSION_TITLE_MAX_CHARS).collect())
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        owner: UserId(row.get(1)?),
        title: row.get(2)?,
        created_at: timestamp::column(row, 3)?,
        last_message_at: timestamp::column(row, 4)?,
        message_count: row.get(5)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role_str: String = row.get(3)?;
    let provider_str: Option<String> = row.get(5)?;

    let role = role_str.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let provider = provider_str
        .map(|p| p.parse::<ProviderTier>())
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChatMessage {
        id: row.get(0)?,
        session_id: row.get(1)?,
        owner: UserId(row.get(2)?),
        role,
        content: row.get(4)?,
        provider,
        created_at: timestamp::column(row, 6)?,
    })
}
