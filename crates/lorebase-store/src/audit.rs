//! Append-only audit log.

use lorebase_shared::UserId;
use rusqlite::types::Value;
use rusqlite::params_from_iter;

use crate::database::Database;
use crate::error::Result;
use crate::models::{AuditEntry, AuditFilter, NewAuditEntry};
use crate::timestamp;

/// Row cap applied when the filter does not set one.
pub const DEFAULT_AUDIT_LIMIT: u32 = 100;

impl Database {
    /// Append an audit record stamped with the current time. Returns its id.
    pub fn record_audit(&self, entry: &NewAuditEntry) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO audit_log (created_at, operation, details, user_id, username)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                timestamp::now_sql(),
                entry.operation,
                entry.details,
                entry.user_id.map(|u| u.0),
                entry.username,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(id, operation = %entry.operation, "audit recorded");
        Ok(id)
    }

    /// Audit records matching `filter`, newest first.
    pub fn query_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(op) = &filter.operation {
            clauses.push("operation = ?");
            args.push(Value::Text(op.clone()));
        }
        if let Some(user) = filter.user_id {
            clauses.push("user_id = ?");
            args.push(Value::Integer(user.0));
        }
        if let Some(since) = &filter.since {
            clauses.push("created_at >= ?");
            args.push(Value::Text(timestamp::to_sql(since)));
        }
        if let Some(until) = &filter.until {
            clauses.push("created_at < ?");
            args.push(Value::Text(timestamp::to_sql(until)));
        }
        args.push(Value::Integer(i64::from(
            filter.limit.unwrap_or(DEFAULT_AUDIT_LIMIT),
        )));

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT id, created_at, operation, details, user_id, username
             FROM audit_log {where_sql}
             ORDER BY created_at DESC, id DESC
             LIMIT ?"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                created_at: timestamp::column(row, 1)?,
                operation: row.get(2)?,
                details: row.get(3)?,
                user_id: row.get::<_, Option<i64>>(4)?.map(UserId),
                username: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
