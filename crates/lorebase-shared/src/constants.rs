/// Application name
pub const APP_NAME: &str = "Lorebase";

/// Database file name inside the data directory
pub const DB_FILE_NAME: &str = "lorebase.db";

/// Width in bytes of one encoded embedding component (IEEE-754 f32)
pub const EMBEDDING_WIDTH: usize = 4;

/// Trailing window over which failed logins are counted
pub const LOCKOUT_WINDOW_MINUTES: i64 = 15;

/// Failed logins inside the window at which an account locks
pub const LOCKOUT_THRESHOLD: usize = 5;

/// Connection pool sizing
pub const DEFAULT_POOL_MAX: u32 = 8;
pub const DEFAULT_POOL_MIN_IDLE: u32 = 2;
pub const DEFAULT_POOL_MAX_LIFETIME_SECS: u64 = 30 * 60;

/// How long a connection waits on a locked database before giving up
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Non-interactive account that owns data from single-tenant installs.
/// Always user id 1.
pub const DEFAULT_ACCOUNT_NAME: &str = "local";
pub const DEFAULT_ACCOUNT_ID: i64 = 1;

/// Administrative account created on first start in multi-tenant mode
pub const ADMIN_ACCOUNT_NAME: &str = "admin";

/// Length of the generated initial admin password
pub const INITIAL_PASSWORD_LEN: usize = 20;

/// Bearer token lifetime in hours (7 days)
pub const TOKEN_TTL_HOURS: i64 = 24 * 7;

/// Maximum characters kept when a session title is derived from a message
pub const SESSION_TITLE_MAX_CHARS: usize = 60;

/// Separator used when a recipient list is stored as a single column
pub const RECIPIENT_DELIMITER: char = ',';
