//! Configuration management for Leasehold
//!
//! Sources, lowest priority first: the YAML file (`conf/leasehold.yml` unless
//! another path is given), environment variables prefixed with `LEASEHOLD`,
//! then explicit overrides such as command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, Value};
use leasehold_common::{DEFAULT_LEASE_TIME, DEFAULT_RETRY_BACKOFF};
use leasehold_persistence::DatabaseSettings;

use crate::settings::LockSettings;

pub const DEFAULT_CONFIG_FILE: &str = "conf/leasehold.yml";

pub const DB_URL: &str = "db.url";
pub const DB_POOL_MAX_CONNECTIONS: &str = "db.pool.maxConnections";
pub const DB_POOL_MIN_CONNECTIONS: &str = "db.pool.minConnections";
pub const DB_POOL_CONNECT_TIMEOUT: &str = "db.pool.connectTimeout";
pub const DB_POOL_ACQUIRE_TIMEOUT: &str = "db.pool.acquireTimeout";
pub const DB_POOL_IDLE_TIMEOUT: &str = "db.pool.idleTimeout";
pub const DB_POOL_MAX_LIFETIME: &str = "db.pool.maxLifetime";
pub const DB_POOL_SQLX_LOGGING: &str = "db.pool.sqlxLogging";
pub const LOCK_LEASE_TIME_MS: &str = "lock.leaseTimeMs";
pub const LOCK_RETRY_BACKOFF_MS: &str = "lock.retryBackoffMs";
pub const LOG_LEVEL: &str = "log.level";
pub const LOG_DIR: &str = "log.dir";

/// Application configuration loaded from file, environment, and overrides
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load from `file`, or from the default file when it exists
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_overrides(file, Vec::new())
    }

    pub fn load_with_overrides(
        file: Option<&Path>,
        overrides: Vec<(String, Value)>,
    ) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut config_builder = Config::builder().add_source(file_source).add_source(
            Environment::with_prefix("LEASEHOLD")
                .separator(".")
                .try_parsing(true),
        );

        for (key, value) in overrides {
            config_builder = config_builder.set_override(key, value)?;
        }

        Ok(Configuration {
            config: config_builder.build()?,
        })
    }

    // ========================================================================
    // Database Configuration
    // ========================================================================

    pub fn db_url(&self) -> Option<String> {
        self.config.get_string(DB_URL).ok()
    }

    /// Pool settings for the SQL store; fails when `db.url` is missing
    pub fn database_settings(&self) -> Result<DatabaseSettings, ConfigError> {
        let mut settings = DatabaseSettings::new(self.config.get_string(DB_URL)?);

        settings.max_connections = self
            .config
            .get_int(DB_POOL_MAX_CONNECTIONS)
            .unwrap_or(settings.max_connections.into()) as u32;
        settings.min_connections = self
            .config
            .get_int(DB_POOL_MIN_CONNECTIONS)
            .unwrap_or(settings.min_connections.into()) as u32;
        settings.connect_timeout =
            self.seconds(DB_POOL_CONNECT_TIMEOUT, settings.connect_timeout);
        settings.acquire_timeout =
            self.seconds(DB_POOL_ACQUIRE_TIMEOUT, settings.acquire_timeout);
        settings.idle_timeout = self.seconds(DB_POOL_IDLE_TIMEOUT, settings.idle_timeout);
        settings.max_lifetime = self.seconds(DB_POOL_MAX_LIFETIME, settings.max_lifetime);
        settings.sqlx_logging = self
            .config
            .get_bool(DB_POOL_SQLX_LOGGING)
            .unwrap_or(settings.sqlx_logging);

        Ok(settings)
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    pub fn lock_settings(&self) -> LockSettings {
        LockSettings::new(
            self.millis(LOCK_LEASE_TIME_MS, DEFAULT_LEASE_TIME),
            self.millis(LOCK_RETRY_BACKOFF_MS, DEFAULT_RETRY_BACKOFF),
        )
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn log_level(&self) -> String {
        self.config
            .get_string(LOG_LEVEL)
            .unwrap_or("info".to_string())
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.config.get_string(LOG_DIR).ok().map(PathBuf::from)
    }

    fn seconds(&self, key: &str, default: Duration) -> Duration {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .map(Duration::from_millis)
            .unwrap_or(default)
    }
}
