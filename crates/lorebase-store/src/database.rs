//! Database connection management.
//!
//! The [`Database`] struct owns a bounded pool of SQLite connections and
//! guarantees that migrations have completed before a handle exists. Every
//! pooled connection runs in WAL mode with foreign keys enforced and a busy
//! timeout, so transient lock contention is retried inside SQLite instead of
//! failing the call.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use lorebase_shared::constants::DB_FILE_NAME;
use lorebase_shared::Tenancy;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Transaction, TransactionBehavior};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::migrations::{self, MigrationReport};
use crate::models::InitialAdmin;

pub(crate) type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Handle to the knowledge store. Cheap to share behind an `Arc`; every
/// operation checks a connection out of the pool for its own duration.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
    tenancy: Tenancy,
    initial_admin: Mutex<Option<InitialAdmin>>,
}

impl Database {
    /// Platform-appropriate location of the database file:
    /// - Linux:   `~/.local/share/lorebase/lorebase.db`
    /// - macOS:   `~/Library/Application Support/org.lorebase.lorebase/lorebase.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\lorebase\lorebase\data\lorebase.db`
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("org", "lorebase", "lorebase").ok_or(StoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().join(DB_FILE_NAME))
    }

    /// Open (or create) the store described by `config` and bring its schema
    /// up to date.
    ///
    /// A migration failure is fatal: the error is returned and no handle is
    /// produced, so nothing can be served from a half-migrated file.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Self::open_with_report(config).map(|(db, _)| db)
    }

    /// [`open`](Self::open), also returning what the startup migration
    /// changed. Generated admin credentials are moved out of the report and
    /// into [`take_initial_admin`](Self::take_initial_admin).
    pub fn open_with_report(config: &StoreConfig) -> Result<(Self, MigrationReport)> {
        let path = match &config.db_path {
            Some(p) => p.clone(),
            None => Self::default_path()?,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(
            path = %path.display(),
            tenancy = ?config.tenancy,
            pool_max = config.pool_max,
            "opening database"
        );

        let busy_timeout = config.busy_timeout;
        let manager = SqliteConnectionManager::file(&path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder()
            .max_size(config.pool_max)
            .min_idle(Some(config.pool_min_idle.min(config.pool_max)))
            .max_lifetime(Some(config.pool_max_lifetime))
            .build(manager)?;

        let db = Self {
            pool,
            path,
            tenancy: config.tenancy,
            initial_admin: Mutex::new(None),
        };

        let mut report = db.migrate()?;
        if let Some(admin) = report.initial_admin.take() {
            if let Ok(mut slot) = db.initial_admin.lock() {
                *slot = Some(admin);
            }
        }

        Ok((db, report))
    }

    /// Open (or create) a single-tenant database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        Self::open(&StoreConfig::at(path))
    }

    /// Run the schema migrator. Safe to call any number of times; a current
    /// schema is left untouched.
    pub fn migrate(&self) -> Result<MigrationReport> {
        let mut conn = self.conn()?;
        migrations::run_migrations(&mut conn, self.tenancy)
    }

    /// Credentials generated for the bootstrap admin account, if this open
    /// created one. Returns `Some` at most once per process.
    pub fn take_initial_admin(&self) -> Option<InitialAdmin> {
        self.initial_admin.lock().ok().and_then(|mut slot| slot.take())
    }

    pub fn tenancy(&self) -> Tenancy {
        self.tenancy
    }

    /// Filesystem path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check a connection out of the pool.
    pub(crate) fn conn(&self) -> Result<PooledConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside an immediate (write-locking) transaction. Any error
    /// rolls the whole transaction back.
    pub(crate) fn write_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A file-backed store in a fresh temp dir. Keep the `TempDir` alive for
    /// the duration of the test.
    pub(crate) fn open_temp(tenancy: Tenancy) -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StoreConfig::at(dir.path().join("test.db"));
        config.tenancy = tenancy;
        let db = Database::open(&config).expect("should open");
        (dir, db)
    }

    /// Insert an account row directly, skipping password hashing.
    pub(crate) fn add_user(db: &Database, username: &str) -> lorebase_shared::UserId {
        let conn = db.conn().unwrap();
        conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, '!', ?2)",
            rusqlite::params![username, crate::timestamp::now_sql()],
        )
        .unwrap();
        lorebase_shared::UserId(conn.last_insert_rowid())
    }
}
