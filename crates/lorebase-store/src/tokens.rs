//! Login session tokens.
//!
//! Tokens are 32 random bytes, hex-encoded, valid for
//! [`TOKEN_TTL_HOURS`]. Expired rows are ignored on lookup and removed by
//! [`Database::purge_expired_tokens`].

use chrono::{DateTime, Duration, SubsecRound, Utc};
use lorebase_shared::constants::TOKEN_TTL_HOURS;
use lorebase_shared::UserId;
use rand::RngCore;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::SessionToken;
use crate::timestamp;

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Database {
    pub fn create_token(&self, user: UserId) -> Result<SessionToken> {
        let created_at = Utc::now().trunc_subsecs(6);
        let token = SessionToken {
            token: new_token(),
            user_id: user,
            created_at,
            expires_at: created_at + Duration::hours(TOKEN_TTL_HOURS),
        };
        self.conn()?.execute(
            "INSERT INTO session_tokens (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token.token,
                user.0,
                timestamp::to_sql(&token.created_at),
                timestamp::to_sql(&token.expires_at),
            ],
        )?;
        Ok(token)
    }

    /// Look up a live token. Unknown and expired tokens are both
    /// [`StoreError::NotFound`].
    pub fn validate_token(&self, token: &str) -> Result<SessionToken> {
        self.validate_token_at(token, Utc::now())
    }

    pub fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionToken> {
        self.conn()?
            .query_row(
                "SELECT token, user_id, created_at, expires_at FROM session_tokens
                 WHERE token = ?1 AND expires_at > ?2",
                params![token, timestamp::to_sql(&now)],
                |row| {
                    Ok(SessionToken {
                        token: row.get(0)?,
                        user_id: UserId(row.get(1)?),
                        created_at: timestamp::column(row, 2)?,
                        expires_at: timestamp::column(row, 3)?,
                    })
                },
            )
            .map_err(StoreError::not_found_on_empty)
    }

    /// Revoke a token (logout). Returns whether it existed.
    pub fn delete_token(&self, token: &str) -> Result<bool> {
        let n = self
            .conn()?
            .execute("DELETE FROM session_tokens WHERE token = ?1", params![token])?;
        Ok(n > 0)
    }

    /// Remove every expired token. Returns the number removed.
    pub fn purge_expired_tokens(&self) -> Result<usize> {
        self.purge_expired_tokens_at(Utc::now())
    }

    pub fn purge_expired_tokens_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let n = self.conn()?.execute(
            "DELETE FROM session_tokens WHERE expires_at <= ?1",
            params![timestamp::to_sql(&now)],
        )?;
        if n > 0 {
            tracing::info!(purged = n, "removed expired session tokens");
        }
        Ok(n)
    }
}
