use anyhow::{Context, Result, bail};
use std::time::Duration;

use crate::credit_policy::CreditPolicy;

/// Which [`crate::credit_store::CreditStore`] backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("LEDGER_STORE must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Runtime configuration, read from the environment
#[derive(Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub pool_size: u32,
    pub pool_timeout: Duration,
    pub interface: String,
    pub port: u16,
    pub credit_policy: CreditPolicy,
    pub environment: String,
    pub sentry_dsn: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup, so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store: StoreBackend = lookup("LEDGER_STORE")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if store == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when LEDGER_STORE=postgres");
        }

        let pool_size: u32 = lookup("DATABASE_POOL_SIZE")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_POOL_SIZE must be a valid number")?;

        let pool_timeout_secs: u64 = lookup("DATABASE_POOL_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("DATABASE_POOL_TIMEOUT_SECS must be a valid number")?;

        let port: u16 = lookup("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .context("PORT must be a valid port number")?;

        let credit_policy = match lookup("CREDIT_GRANTS") {
            Some(spec) => CreditPolicy::parse(&spec).context("CREDIT_GRANTS is invalid")?,
            None => CreditPolicy::default(),
        };

        Ok(Self {
            store,
            database_url,
            pool_size,
            pool_timeout: Duration::from_secs(pool_timeout_secs),
            interface: lookup("INTERFACE").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            credit_policy,
            environment: lookup("LEDGER_ENV").unwrap_or_else(|| "development".to_string()),
            sentry_dsn: lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty()),
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("store", &self.store)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("pool_size", &self.pool_size)
            .field("pool_timeout", &self.pool_timeout)
            .field("interface", &self.interface)
            .field("port", &self.port)
            .field("credit_policy", &self.credit_policy)
            .field("environment", &self.environment)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
