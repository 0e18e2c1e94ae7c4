use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use vemix_ledger::config::Config;
use vemix_ledger::telemetry;

mod commands;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(name = "vemix-ledger")]
#[command(about = "Credits ledger and RevenueCat webhook reconciliation for Vemix")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Interface to bind to (overrides INTERFACE)
        #[arg(long)]
        interface: Option<String>,

        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(sentry_guard.is_some());

    let result = match cli.command {
        Commands::Serve { interface, port } => {
            commands::handle_serve(config, interface, port).await
        }
        Commands::Migrate => commands::handle_migrate(config).await,
    };

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}
