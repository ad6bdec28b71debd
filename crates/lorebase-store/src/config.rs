//! Store configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the store can open with zero
//! configuration for a single-user install.

use std::path::PathBuf;
use std::time::Duration;

use lorebase_shared::constants::{
    DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_POOL_MAX, DEFAULT_POOL_MAX_LIFETIME_SECS,
    DEFAULT_POOL_MIN_IDLE,
};
use lorebase_shared::Tenancy;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the database file. `None` selects the platform data
    /// directory (see [`Database::default_path`](crate::Database::default_path)).
    /// Env: `LOREBASE_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Deployment mode. Multi-tenant mode bootstraps an admin account and
    /// scopes retrieval by visibility.
    /// Env: `LOREBASE_MULTI_TENANT` (true/false)
    /// Default: single
    pub tenancy: Tenancy,

    /// Maximum number of pooled connections.
    /// Env: `LOREBASE_POOL_MAX`
    /// Default: `8`
    pub pool_max: u32,

    /// Idle connections the pool keeps open.
    /// Env: `LOREBASE_POOL_MIN_IDLE`
    /// Default: `2`
    pub pool_min_idle: u32,

    /// Connections older than this are closed and replaced.
    /// Env: `LOREBASE_POOL_MAX_LIFETIME_SECS`
    /// Default: 30 minutes
    pub pool_max_lifetime: Duration,

    /// How long a statement waits on a locked database before failing.
    /// Env: `LOREBASE_BUSY_TIMEOUT_MS`
    /// Default: 5 seconds
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            tenancy: Tenancy::Single,
            pool_max: DEFAULT_POOL_MAX,
            pool_min_idle: DEFAULT_POOL_MIN_IDLE,
            pool_max_lifetime: Duration::from_secs(DEFAULT_POOL_MAX_LIFETIME_SECS),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl StoreConfig {
    /// Configuration for a database file at `path`, other settings default.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("LOREBASE_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("LOREBASE_MULTI_TENANT") {
            match val.parse::<Tenancy>() {
                Ok(t) => config.tenancy = t,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid LOREBASE_MULTI_TENANT, using default");
                }
            }
        }

        if let Some(n) = parse_var::<u32>(&lookup, "LOREBASE_POOL_MAX") {
            if n > 0 {
                config.pool_max = n;
            }
        }

        if let Some(n) = parse_var::<u32>(&lookup, "LOREBASE_POOL_MIN_IDLE") {
            config.pool_min_idle = n;
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "LOREBASE_POOL_MAX_LIFETIME_SECS") {
            config.pool_max_lifetime = Duration::from_secs(secs);
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "LOREBASE_BUSY_TIMEOUT_MS") {
            config.busy_timeout = Duration::from_millis(ms);
        }

        // The idle floor can never exceed the pool size.
        config.pool_min_idle = config.pool_min_idle.min(config.pool_max);

        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid numeric setting, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> StoreConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StoreConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.tenancy, Tenancy::Single);
        assert_eq!(config.pool_max, 8);
        assert_eq!(config.pool_min_idle, 2);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = config_from(&[
            ("LOREBASE_DB_PATH", "/tmp/x.db"),
            ("LOREBASE_MULTI_TENANT", "true"),
            ("LOREBASE_POOL_MAX", "4"),
            ("LOREBASE_BUSY_TIMEOUT_MS", "250"),
        ]);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/x.db")));
        assert_eq!(config.tenancy, Tenancy::Multi);
        assert_eq!(config.pool_max, 4);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("LOREBASE_MULTI_TENANT", "sometimes"),
            ("LOREBASE_POOL_MAX", "lots"),
            ("LOREBASE_POOL_MIN_IDLE", "50"),
        ]);
        assert_eq!(config.tenancy, Tenancy::Single);
        assert_eq!(config.pool_max, 8);
        assert_eq!(config.pool_min_idle, 8);
    }
}
