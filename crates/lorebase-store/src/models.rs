//! Domain model structs persisted in the knowledge store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the rendering layer.

use std::fmt;

use chrono::{DateTime, Utc};
use lorebase_shared::{ProviderTier, RecipientSet, Role, UserId, Visibility};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An account. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub is_admin: bool,
    /// Set for generated credentials; cleared by a password change.
    pub must_change_password: bool,
    /// UI preference.
    pub dark_mode: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Credentials generated for the bootstrap admin account.
///
/// Available exactly once through
/// [`Database::take_initial_admin`](crate::Database::take_initial_admin).
#[derive(Clone, PartialEq, Eq)]
pub struct InitialAdmin {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for InitialAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A unit of ingested text with its embedding and access metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: i64,
    pub owner: UserId,
    pub source: String,
    pub text: String,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub visibility: Visibility,
    /// Only meaningful when `visibility` is [`Visibility::Shared`].
    pub shared_with: RecipientSet,
    pub created_at: DateTime<Utc>,
}

/// Input for a chunk about to be ingested.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub visibility: Visibility,
    pub shared_with: RecipientSet,
}

/// A search hit, best first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMatch {
    pub chunk: Chunk,
    pub score: f32,
}

/// One row of the per-source library view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryEntry {
    pub source: String,
    pub owner: UserId,
    pub chunk_count: i64,
    /// Taken from the most recently written chunk of the source.
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub shared_with: RecipientSet,
    /// Earliest chunk creation time for the source.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Conversation metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub owner: UserId,
    pub title: Option<String>,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

/// One turn in a session. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub owner: UserId,
    pub role: Role,
    pub content: String,
    /// Set for assistant turns only.
    pub provider: Option<ProviderTier>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Derived lock state of an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockState {
    pub locked: bool,
    /// When the lock lapses on its own; `None` when not locked.
    pub unlock_at: Option<DateTime<Utc>>,
}

impl LockState {
    pub fn unlocked() -> Self {
        Self {
            locked: false,
            unlock_at: None,
        }
    }
}

/// A bearer token issued at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub operation: String,
    pub details: String,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub operation: String,
    pub details: String,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
}

/// Filters for [`Database::query_audit`](crate::Database::query_audit).
/// Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditFilter {
    pub operation: Option<String>,
    pub user_id: Option<UserId>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Plugins and watchers
// ---------------------------------------------------------------------------

/// A directory monitored for automatic ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchedFolder {
    pub id: i64,
    pub owner: UserId,
    pub path: String,
    pub active: bool,
    pub last_scan: Option<DateTime<Utc>>,
}

/// A user-registered executable plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Skill {
    pub id: i64,
    pub owner: UserId,
    pub name: String,
    pub path: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}
