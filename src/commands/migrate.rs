use anyhow::{Context, Result};
use tracing::info;
use vemix_ledger::config::Config;
use vemix_ledger::db;

/// Apply pending migrations and exit
pub async fn handle_migrate(config: Config) -> Result<()> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;

    let pool = db::create_pool(database_url, 1, config.pool_timeout)?;
    let applied = db::run_migrations(&pool).await?;

    if applied == 0 {
        info!("Database schema is up to date");
    } else {
        info!("Applied {} migration(s)", applied);
    }
    Ok(())
}
