use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use vemix_ledger::actions::init_server_start_time;
use vemix_ledger::config::{Config, StoreBackend};
use vemix_ledger::credit_store::{CreditStore, PgCreditStore};
use vemix_ledger::db;
use vemix_ledger::memory_store::MemoryCreditStore;
use vemix_ledger::metrics::{init_metrics, initialize_ledger_metrics};
use vemix_ledger::web::{AppState, start_web_server};

pub async fn handle_serve(config: Config, interface: Option<String>, port: Option<u16>) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "serve");
    });

    let store = build_store(&config).await?;

    let metrics = match init_metrics() {
        Ok(handle) => {
            initialize_ledger_metrics();
            Some(handle)
        }
        Err(e) => {
            warn!("Metrics disabled: {:#}", e);
            None
        }
    };

    init_server_start_time();

    let interface = interface.unwrap_or_else(|| config.interface.clone());
    let port = port.unwrap_or(config.port);
    let app_state = AppState::new(store, config.credit_policy.clone(), metrics);

    start_web_server(interface, port, app_state).await
}

async fn build_store(config: &Config) -> Result<Arc<dyn CreditStore>> {
    match config.store {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when LEDGER_STORE=postgres")?;

            let pool = db::create_pool(database_url, config.pool_size, config.pool_timeout)?;
            info!(
                "Database connection pool created (max {} connections)",
                config.pool_size
            );

            let applied = db::run_migrations(&pool).await?;
            info!("Database migrations complete ({} applied)", applied);

            Ok(Arc::new(PgCreditStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory credit store; balances are lost on restart");
            Ok(Arc::new(MemoryCreditStore::new()))
        }
    }
}
