//! # lorebase-store
//!
//! Persistent, multi-tenant storage for the Lorebase knowledge store, backed
//! by SQLite.
//!
//! The crate exposes a synchronous, thread-safe [`Database`] handle over a
//! pool of connections. Opening a handle runs the schema migrator first, so
//! every method can assume a current schema. Retrieval is tenant-scoped:
//! a user sees their own chunks, public chunks, and chunks shared with them.
//! In multi-tenant mode, sessions, folders, skills and tokens belong to
//! exactly one account.

pub mod audit;
pub mod chunks;
pub mod config;
pub mod database;
pub mod folders;
pub mod lockout;
pub mod migrations;
pub mod models;
pub mod sessions;
pub mod skills;
pub mod tokens;
pub mod users;

mod error;
mod timestamp;

pub use config::StoreConfig;
pub use database::Database;
pub use error::{Result, StoreError};
pub use migrations::MigrationReport;
pub use models::*;
pub use sessions::new_session_id;

pub use lorebase_shared::{ProviderTier, RecipientSet, Role, Tenancy, UserId, Visibility};
