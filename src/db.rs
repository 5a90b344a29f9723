use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, error, info};

/// Represents a banned user in the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BanRecord {
    pub chat_id: i64,
    pub username: Option<String>,
    pub tried_unban: bool,
}

/// Persistent ban list backed by SQLite
///
/// Every operation runs as its own statement; failures are logged and
/// reported as a negative result rather than propagated.
#[derive(Debug, Clone)]
pub struct BanStore {
    pool: SqlitePool,
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS banned (
            chat_id INTEGER PRIMARY KEY,
            username TEXT,
            tried_unban BOOLEAN NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create banned table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

impl BanStore {
    /// Open the pool at `database_url` and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {database_url}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to connect to ban database")?;

        Self::from_pool(pool).await
    }

    /// In-memory store, one connection so every query sees the same database
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        init_database_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Ban a user; banning an already banned user succeeds without a new row
    pub async fn ban(&self, chat_id: i64, username: Option<&str>) -> bool {
        let result = sqlx::query("INSERT OR IGNORE INTO banned (chat_id, username) VALUES (?1, ?2)")
            .bind(chat_id)
            .bind(username)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => {
                if done.rows_affected() == 0 {
                    debug!(user_id = chat_id, "User was already banned");
                } else {
                    info!(user_id = chat_id, username = ?username, "User banned");
                }
                true
            }
            Err(e) => {
                error!(user_id = chat_id, error = %e, "Failed to ban user");
                false
            }
        }
    }

    /// Remove a ban; false when the user was not banned or the delete failed
    pub async fn unban(&self, chat_id: i64) -> bool {
        let result = sqlx::query("DELETE FROM banned WHERE chat_id = ?1")
            .bind(chat_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                info!(user_id = chat_id, "User unbanned");
                true
            }
            Ok(_) => {
                debug!(user_id = chat_id, "Unban requested for user without ban record");
                false
            }
            Err(e) => {
                error!(user_id = chat_id, error = %e, "Failed to unban user");
                false
            }
        }
    }

    pub async fn get(&self, chat_id: i64) -> Option<BanRecord> {
        let result = sqlx::query_as::<_, BanRecord>(
            "SELECT chat_id, username, tried_unban FROM banned WHERE chat_id = ?1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(record) => record,
            Err(e) => {
                error!(user_id = chat_id, error = %e, "Failed to read ban record");
                None
            }
        }
    }

    pub async fn is_banned(&self, chat_id: i64) -> bool {
        self.get(chat_id).await.is_some()
    }

    pub async fn has_requested_unban(&self, chat_id: i64) -> bool {
        self.get(chat_id)
            .await
            .map(|record| record.tried_unban)
            .unwrap_or(false)
    }

    /// Flag the single unban request of a banned user; no-op without a record
    pub async fn mark_unban_requested(&self, chat_id: i64) {
        let result = sqlx::query("UPDATE banned SET tried_unban = 1 WHERE chat_id = ?1")
            .bind(chat_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                info!(user_id = chat_id, "Unban request recorded");
            }
            Ok(_) => debug!(user_id = chat_id, "No ban record to mark"),
            Err(e) => error!(user_id = chat_id, error = %e, "Failed to record unban request"),
        }
    }

    pub async fn list_all(&self) -> Vec<BanRecord> {
        let result = sqlx::query_as::<_, BanRecord>(
            "SELECT chat_id, username, tried_unban FROM banned ORDER BY chat_id",
        )
        .fetch_all(&self.pool)
        .await;

        match result {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to list ban records");
                Vec::new()
            }
        }
    }
}
