use sentry::ClientInitGuard;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

/// Initialize Sentry when a DSN is configured. The returned guard flushes
/// pending events on drop, so keep it alive for the life of the process.
pub fn init_sentry(config: &Config) -> Option<ClientInitGuard> {
    let dsn = config.sentry_dsn.as_deref()?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    if guard.is_enabled() {
        Some(guard)
    } else {
        None
    }
}

/// Install the global tracing subscriber. `RUST_LOG` controls filtering
/// and defaults to `info`. Error events are forwarded to Sentry when it is
/// enabled.
pub fn init_tracing(sentry_enabled: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = sentry_enabled.then(sentry_tracing::layer);

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(sentry_layer);

    // A subscriber may already be installed when embedded in tests
    if registry.try_init().is_ok() && sentry_enabled {
        info!("Sentry error reporting enabled");
    }
}
