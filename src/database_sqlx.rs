use anyhow::Result;
use chrono::Utc;
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Row, SqlitePool};
use tracing::{debug, info};

use crate::storage::FlagStore;

/// SQLite-backed persistent flag store
#[derive(Clone)]
pub struct FlagStoreSqlx {
    pool: SqlitePool,
}

impl FlagStoreSqlx {
    /// Open (or create) the flag database at the given path
    pub async fn new(database_path: &str) -> Result<Self> {
        let path = database_path.strip_prefix("sqlite:").unwrap_or(database_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(SqliteConnectOptions::new().filename(path).create_if_missing(true))
            .await?;

        Self::with_pool(pool).await.map(|store| {
            info!("💾 Flag store opened at {}", path);
            store
        })
    }

    /// Wrap an existing pool, creating the table if needed
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#
        ).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Every stored key with its value, ordered by key
    pub async fn entries(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT key, value FROM metadata ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("key"), row.get::<String, _>("value")))
            .collect())
    }
}

#[async_trait::async_trait]
impl FlagStore for FlagStoreSqlx {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        debug!("Stored {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM metadata WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        debug!("Removed {}", key);
        Ok(())
    }
}
