//! Account lockout derived from the failed-login log.
//!
//! There is no "locked" flag anywhere. An account is locked while at least
//! [`LOCKOUT_THRESHOLD`] failed attempts fall inside the trailing
//! [`LOCKOUT_WINDOW_MINUTES`] window, and the lock lapses on its own when
//! the oldest of those attempts leaves the window.
//!
//! # Storage faults
//!
//! The lock check fails open: if the log cannot be read, the account is
//! reported unlocked and the fault is logged at `error` level. Keeping the
//! login path available takes priority over enforcing the lockout while
//! storage is unhealthy. Do not turn this into fail-closed without changing
//! the documented security posture.

use chrono::{DateTime, Duration, Utc};
use lorebase_shared::constants::{LOCKOUT_THRESHOLD, LOCKOUT_WINDOW_MINUTES};
use rusqlite::{params, Connection};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::LockState;
use crate::timestamp;

fn window() -> Duration {
    Duration::minutes(LOCKOUT_WINDOW_MINUTES)
}

impl Database {
    pub fn record_failed_login(&self, username: &str) -> Result<()> {
        self.record_failed_login_at(username, Utc::now())
    }

    /// [`record_failed_login`](Self::record_failed_login) with an explicit
    /// attempt time.
    pub fn record_failed_login_at(&self, username: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO failed_logins (username, attempted_at) VALUES (?1, ?2)",
            params![username, timestamp::to_sql(&at)],
        )?;
        tracing::debug!(username, "recorded failed login");
        Ok(())
    }

    /// Forget every failed attempt for `username`. Called after a
    /// successful login; the account is unlocked immediately.
    pub fn clear_failed_logins(&self, username: &str) -> Result<usize> {
        let removed = self.conn()?.execute(
            "DELETE FROM failed_logins WHERE username = ?1",
            params![username],
        )?;
        Ok(removed)
    }

    /// Current lock state. Never fails; see the module docs on storage faults.
    pub fn is_account_locked(&self, username: &str) -> LockState {
        self.is_account_locked_at(username, Utc::now())
    }

    /// [`is_account_locked`](Self::is_account_locked) evaluated at `now`.
    pub fn is_account_locked_at(&self, username: &str, now: DateTime<Utc>) -> LockState {
        let state = self
            .conn()
            .and_then(|conn| lock_state(&conn, username, now));
        match state {
            Ok(state) => state,
            Err(e) => fail_open(username, e),
        }
    }
}

/// The fail-open policy: a lock state that cannot be read is "unlocked".
fn fail_open(username: &str, err: StoreError) -> LockState {
    tracing::error!(
        username,
        error = %err,
        "could not evaluate lockout, allowing login attempt (fail-open)"
    );
    LockState::unlocked()
}

fn lock_state(conn: &Connection, username: &str, now: DateTime<Utc>) -> Result<LockState> {
    let cutoff = timestamp::to_sql(&(now - window()));
    let mut stmt = conn.prepare(
        "SELECT attempted_at FROM failed_logins
         WHERE username = ?1 AND attempted_at > ?2
         ORDER BY attempted_at DESC
         LIMIT ?3",
    )?;
    let recent = stmt
        .query_map(params![username, cutoff, LOCKOUT_THRESHOLD as i64], |row| {
            timestamp::column(row, 0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if recent.len() < LOCKOUT_THRESHOLD {
        return Ok(LockState::unlocked());
    }

    // The threshold-th most recent attempt is the one whose expiry ends
    // the lock.
    let unlock_at = recent[LOCKOUT_THRESHOLD - 1] + window();
    tracing::debug!(username, %unlock_at, "account locked");
    Ok(LockState {
        locked: true,
        unlock_at: Some(unlock_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::open_temp;
    use chrono::TimeZone;
    use lorebase_shared::Tenancy;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn fifth_failure_locks_for_the_window() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let at = t0();

        for _ in 0..4 {
            db.record_failed_login_at("mallory", at).unwrap();
        }
        assert_eq!(db.is_account_locked_at("mallory", at), LockState::unlocked());

        db.record_failed_login_at("mallory", at).unwrap();
        let state = db.is_account_locked_at("mallory", at);
        assert!(state.locked);
        assert_eq!(state.unlock_at, Some(at + Duration::minutes(15)));
    }

    #[test]
    fn lock_decays_as_attempts_leave_the_window() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let start = t0();
        for i in 0..5 {
            db.record_failed_login_at("eve", start + Duration::minutes(i))
                .unwrap();
        }

        let now = start + Duration::minutes(4);
        let state = db.is_account_locked_at("eve", now);
        assert!(state.locked);
        // bounded by the oldest of the five qualifying attempts
        assert_eq!(state.unlock_at, Some(start + Duration::minutes(15)));

        let just_before = start + Duration::minutes(15) - Duration::seconds(1);
        assert!(db.is_account_locked_at("eve", just_before).locked);
        let at_expiry = start + Duration::minutes(15);
        assert!(!db.is_account_locked_at("eve", at_expiry).locked);

        // One more failure brings the window back to five.
        db.record_failed_login_at("eve", at_expiry).unwrap();
        let state = db.is_account_locked_at("eve", at_expiry);
        assert!(state.locked);
        assert_eq!(state.unlock_at, Some(start + Duration::minutes(16)));
    }

    #[test]
    fn clearing_unlocks_immediately() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let at = t0();
        for _ in 0..6 {
            db.record_failed_login_at("trudy", at).unwrap();
        }
        assert!(db.is_account_locked_at("trudy", at).locked);

        assert_eq!(db.clear_failed_logins("trudy").unwrap(), 6);
        assert_eq!(db.is_account_locked_at("trudy", at), LockState::unlocked());
    }

    #[test]
    fn old_attempts_and_other_users_do_not_count() {
        let (_dir, db) = open_temp(Tenancy::Single);
        let now = t0();
        for i in 0..10 {
            db.record_failed_login_at("victor", now - Duration::minutes(20 + i))
                .unwrap();
        }
        for _ in 0..5 {
            db.record_failed_login_at("walter", now).unwrap();
        }
        assert!(!db.is_account_locked_at("victor", now).locked);
        assert!(db.is_account_locked_at("walter", now).locked);
    }

    #[test]
    fn live_clock_variants_agree() {
        let (_dir, db) = open_temp(Tenancy::Single);
        for _ in 0..5 {
            db.record_failed_login("oscar").unwrap();
        }
        let state = db.is_account_locked("oscar");
        assert!(state.locked);
        assert!(state.unlock_at.unwrap() > Utc::now());
    }

    #[test]
    fn storage_fault_fails_open() {
        let (_dir, db) = open_temp(Tenancy::Single);
        for _ in 0..5 {
            db.record_failed_login_at("peggy", t0()).unwrap();
        }
        db.conn()
            .unwrap()
            .execute_batch("DROP TABLE failed_logins;")
            .unwrap();

        assert_eq!(db.is_account_locked_at("peggy", t0()), LockState::unlocked());
    }
}
