// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use crate::config::DatabaseConfig;
use anyhow::{anyhow, Context, Result};
use deadpool::managed::PoolError;
use deadpool::Runtime;
use diesel::{Connection, PgConnection};
use diesel_async::{
    pooled_connection::{AsyncDieselConnectionManager, PoolError as ConnectionError},
    AsyncPgConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

pub type DbPool = deadpool::managed::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type DbConnection = deadpool::managed::Object<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database manager for the API
pub struct Database {
    pool: DbPool,
    url: String,
}

impl Database {
    /// Create a new database manager with connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.url);

        // Configure pool with connection parameters
        let pool = DbPool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .context("Failed to build database pool")?;

        let db = Self {
            pool,
            url: config.url.clone(),
        };

        // Test connection and run migrations
        db.initialize().await?;

        Ok(db)
    }

    /// Initialize the database by testing connection and running migrations
    async fn initialize(&self) -> Result<()> {
        let _conn = self
            .get_connection()
            .await
            .map_err(|e| anyhow!("Failed to connect to the database: {}", e))?;
        info!("Successfully connected to the database");

        // Migrations use a blocking connection, keep them off the runtime threads
        let url = self.url.clone();
        tokio::task::spawn_blocking(move || run_migrations(&url))
            .await
            .context("Migration task panicked")??;

        Ok(())
    }

    /// Get a database connection from the pool
    pub async fn get_connection(&self) -> Result<DbConnection, PoolError<ConnectionError>> {
        self.pool.get().await
    }
}

/// Run database migrations
fn run_migrations(url: &str) -> Result<()> {
    let mut conn = PgConnection::establish(url).context("Failed to open migration connection")?;

    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Failed to apply migrations: {}", e))?;
    info!("Database migrations applied successfully");

    Ok(())
}

/// Initialize database connection pool and run migrations
pub async fn init_database(config: &DatabaseConfig) -> Result<Database> {
    Database::new(config).await
}
