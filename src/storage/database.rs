/// SQLite connection pool and schema
///
/// One database file holds definitions, instances and approval requests. Records
/// are stored as JSON documents next to the scalar columns queries filter on.

use crate::config::DatabaseConfig;
use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Owns the pool and knows how to create the schema.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let data_dir = Path::new(&config.data_dir);
        std::fs::create_dir_all(data_dir).map_err(|e| {
            anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir.display(), e)
        })?;
        let db_path = data_dir.join(&config.file_name);

        tracing::info!("🗄️ Opening process database: {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let database = Self { pool };
        database.init_schema().await?;

        tracing::info!("✅ Process database ready: {}", db_path.display());
        Ok(database)
    }

    /// Private in-memory database, used by tests.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// pinned to a single connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let database = Self { pool };
        database.init_schema().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes. Safe to call repeatedly.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS process_definitions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                project TEXT NOT NULL,
                revision INTEGER NOT NULL,
                definition JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS process_instances (
                id TEXT PRIMARY KEY,
                process_id TEXT NOT NULL,
                project TEXT NOT NULL,
                status TEXT NOT NULL,
                version INTEGER NOT NULL,
                instance JSON NOT NULL,
                created TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS approval_requests (
                id TEXT PRIMARY KEY,
                instance_id TEXT,
                target_role TEXT NOT NULL,
                project TEXT NOT NULL,
                request JSON NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_definitions_project ON process_definitions(project)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_instances_project_status ON process_instances(project, status)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_approvals_role_project ON approval_requests(target_role, project)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
