//! Database connection settings

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Connection pool settings for the SQL lock store
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub sqlx_logging: bool,
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(8),
            idle_timeout: Duration::from_secs(10),
            max_lifetime: Duration::from_secs(1800),
            sqlx_logging: false,
        }
    }

    /// Set the pool size bounds
    pub fn with_pool_size(mut self, min_connections: u32, max_connections: u32) -> Self {
        self.min_connections = min_connections;
        self.max_connections = max_connections;
        self
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(self.url.clone());

        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            .sqlx_logging(self.sqlx_logging)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        opt
    }

    /// Open the connection pool
    pub async fn connect(&self) -> anyhow::Result<DatabaseConnection> {
        tracing::info!(
            max_connections = self.max_connections,
            min_connections = self.min_connections,
            connect_timeout = self.connect_timeout.as_secs(),
            idle_timeout = self.idle_timeout.as_secs(),
            max_lifetime = self.max_lifetime.as_secs(),
            sqlx_logging = self.sqlx_logging,
            "Database connection pool configured"
        );

        let database_connection = Database::connect(self.connect_options()).await?;

        Ok(database_connection)
    }
}
