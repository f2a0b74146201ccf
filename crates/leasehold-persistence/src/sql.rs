//! SQL lock store (MySQL/PostgreSQL/SQLite via SeaORM)
//!
//! Every operation checks a connection out of the pool for its own duration
//! and returns it afterwards; no connection is shared between two operations.

use async_trait::async_trait;
use sea_orm::{prelude::Expr, *};
use tracing::debug;

use crate::entity::distributed_lock;
use crate::model::{LockRecord, StorageMode};
use crate::settings::DatabaseSettings;
use crate::traits::LockStore;

/// External database lock store
///
/// Wraps a SeaORM `DatabaseConnection` pool and maps the four lock operations
/// onto single-statement conditional writes against `distributed_lock`.
#[derive(Clone)]
pub struct SqlLockStore {
    db: DatabaseConnection,
}

impl SqlLockStore {
    /// Create a new SqlLockStore with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open a connection pool from settings
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        Ok(Self::new(settings.connect().await?))
    }

    /// Get a reference to the underlying database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Create the `distributed_lock` table if it does not exist
pub async fn ensure_schema(db: &DatabaseConnection) -> anyhow::Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt = schema.create_table_from_entity(distributed_lock::Entity);
    stmt.if_not_exists();

    db.execute(backend.build(&stmt)).await?;

    debug!(backend = ?backend, "Lock table ensured");
    Ok(())
}

#[async_trait]
impl LockStore for SqlLockStore {
    async fn find(&self, lock_key: &str) -> anyhow::Result<Option<LockRecord>> {
        let result = distributed_lock::Entity::find_by_id(lock_key.to_string())
            .one(&self.db)
            .await?;
        Ok(result.map(LockRecord::from))
    }

    async fn insert_if_absent(&self, lock_key: &str, expired_time: i64) -> anyhow::Result<bool> {
        let model = distributed_lock::ActiveModel {
            lock_key: Set(lock_key.to_string()),
            version: Set(1),
            expired_time: Set(expired_time),
        };

        match distributed_lock::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
        {
            Ok(rows) => Ok(rows > 0),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(lock_key = %lock_key, "Lock record created concurrently");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_if_version(
        &self,
        lock_key: &str,
        expected_version: i64,
        expired_time: i64,
    ) -> anyhow::Result<u64> {
        let result = distributed_lock::Entity::update_many()
            .col_expr(
                distributed_lock::Column::Version,
                Expr::col(distributed_lock::Column::Version).add(1),
            )
            .col_expr(
                distributed_lock::Column::ExpiredTime,
                Expr::value(expired_time),
            )
            .filter(distributed_lock::Column::LockKey.eq(lock_key))
            .filter(distributed_lock::Column::Version.eq(expected_version))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_if_version(
        &self,
        lock_key: &str,
        expected_version: i64,
    ) -> anyhow::Result<u64> {
        let result = distributed_lock::Entity::delete_many()
            .filter(distributed_lock::Column::LockKey.eq(lock_key))
            .filter(distributed_lock::Column::Version.eq(expected_version))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn force_delete(&self, lock_key: &str) -> anyhow::Result<bool> {
        let result = distributed_lock::Entity::delete_many()
            .filter(distributed_lock::Column::LockKey.eq(lock_key))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    fn storage_mode(&self) -> StorageMode {
        StorageMode::ExternalDb
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.db.ping().await?;
        Ok(())
    }
}
