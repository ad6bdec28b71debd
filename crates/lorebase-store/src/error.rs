use rusqlite::{ffi, ErrorCode};
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No pooled connection became available in time.
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The referenced session, user, skill or token does not exist.
    #[error("Record not found")]
    NotFound,

    /// An ownership check failed.
    #[error("Access denied")]
    AccessDenied,

    /// A unique key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Migration failure. The whole batch was rolled back.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored or supplied value could not be interpreted.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Password hashing failed.
    #[error("Password hash error: {0}")]
    PasswordHash(String),
}

impl StoreError {
    /// Busy/locked databases and pool checkout timeouts are transient; the
    /// caller may retry the whole request.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            StoreError::Pool(_) => true,
            _ => false,
        }
    }

    /// Map a unique or primary-key violation to [`StoreError::Conflict`]
    /// and a foreign-key violation (unknown referenced row) to
    /// [`StoreError::NotFound`]. Other constraint failures stay `Sqlite`.
    pub(crate) fn conflict_on_unique(err: rusqlite::Error, what: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    StoreError::Conflict(what.to_string())
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StoreError::NotFound,
                _ => StoreError::Sqlite(err),
            },
            _ => StoreError::Sqlite(err),
        }
    }

    /// Map "no rows" to [`StoreError::NotFound`].
    pub(crate) fn not_found_on_empty(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Sqlite(other),
        }
    }
}

impl From<lorebase_shared::ParseError> for StoreError {
    fn from(e: lorebase_shared::ParseError) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
