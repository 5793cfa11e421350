//! filekeep CLI
//!
//! # Usage
//!
//! ```bash
//! # Start the server with ./filekeep.toml (if present) and FILEKEEP_* env vars
//! filekeep serve
//!
//! # Explicit config file and port
//! filekeep serve --config /etc/filekeep.toml --port 8080
//!
//! # Validate configuration without starting
//! filekeep check-config
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use filekeep::{config::BackendKind, config::FileKeepConfig, observability, server};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "filekeep")]
#[command(version)]
#[command(about = "File upload backend with soft-delete archiving", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./filekeep.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Load and validate configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init()?;

    let mut config = FileKeepConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config, shutdown_signal()).await
        }
        Commands::CheckConfig => check_config(&config),
    }
}

fn check_config(config: &FileKeepConfig) -> Result<()> {
    match config.storage.backend {
        BackendKind::Local => {}
        BackendKind::Drive => config.storage.drive.validate()?,
        BackendKind::Cloudinary => config.storage.cloudinary.validate()?,
    }

    tracing::info!(
        backend = ?config.storage.backend,
        address = %config.bind_address(),
        max_file_size = config.upload.max_file_size,
        max_files = config.upload.max_files,
        "Configuration is valid"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
