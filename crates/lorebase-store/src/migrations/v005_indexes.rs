//! v005 -- Indexes for the visibility-scoped queries, the message ledger
//! and the lockout window.

use lorebase_shared::Tenancy;
use rusqlite::Connection;

use super::MigrationReport;
use crate::error::Result;

const UP_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_chunks_user_source
    ON chunks(user_id, source);
CREATE INDEX IF NOT EXISTS idx_chunks_visibility
    ON chunks(visibility);

CREATE INDEX IF NOT EXISTS idx_sessions_user_last
    ON sessions(user_id, last_message_at DESC);
CREATE INDEX IF NOT EXISTS idx_chat_messages_session_ts
    ON chat_messages(session_id, created_at);

CREATE INDEX IF NOT EXISTS idx_failed_logins_username_ts
    ON failed_logins(username, attempted_at);
CREATE INDEX IF NOT EXISTS idx_session_tokens_expires
    ON session_tokens(expires_at);

CREATE INDEX IF NOT EXISTS idx_audit_log_created
    ON audit_log(created_at);
CREATE INDEX IF NOT EXISTS idx_audit_log_operation
    ON audit_log(operation, created_at);

CREATE UNIQUE INDEX IF NOT EXISTS idx_watched_folders_owner_path
    ON watched_folders(user_id, path);
CREATE INDEX IF NOT EXISTS idx_skills_user
    ON skills(user_id);
"#;

pub fn up(conn: &Connection, _tenancy: Tenancy, _report: &mut MigrationReport) -> Result<()> {
    conn.execute_batch(UP_SQL)?;
    Ok(())
}
