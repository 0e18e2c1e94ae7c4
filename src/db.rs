use anyhow::{Context, Result};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::time::Duration;
use tracing::info;

use crate::web::PgPool;

// Embed migrations at compile time
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

/// Build the r2d2 pool. Connections are checked out per operation and go
/// back to the pool when dropped.
pub fn create_pool(database_url: &str, max_size: u32, timeout: Duration) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .connection_timeout(timeout)
        .build(manager)
        .context("Failed to create database connection pool")
}

/// Apply any pending embedded migrations, returning how many ran
pub async fn run_migrations(pool: &PgPool) -> Result<usize> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .context("Failed to get connection for migrations")?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;

        for version in &applied {
            info!("Applied migration {}", version);
        }

        Ok::<usize, anyhow::Error>(applied.len())
    })
    .await
    .context("Migration task panicked")?
}
