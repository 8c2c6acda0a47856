//! cargodesk: cargo dashboard and account settings backend.
//!
//! ```bash
//! JWT_SECRET=change-me cargodesk          # serve on 127.0.0.1:5000
//! cargodesk seed                          # insert the default cargo summary
//! ```

use anyhow::Result;
use cargodesk::{dashboard, gateway, Config};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cargodesk")]
#[command(about = "Cargo dashboard and account settings backend", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Insert the default cargo summary into the database
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let mut config = Config::load()?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            gateway::run_gateway(config).await
        }
        Commands::Seed => {
            let config = Config::resolve()?;
            let summary = dashboard::seed(&config.storage.database_path)?;
            tracing::info!(
                "Seeded {}: total={} in_transit={} delivered={}",
                config.storage.database_path.display(),
                summary.total_cargo,
                summary.in_transit,
                summary.delivered
            );
            Ok(())
        }
    }
}
