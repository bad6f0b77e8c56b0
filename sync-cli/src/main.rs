//! # writerlink
//!
//! Terminal front end for WriterLink: mirror a document open on the phone
//! and edit it from the desktop.
//!
//! ## Commands
//!
//! - `run`: Start an interactive session
//! - `normalize`: Check an address without connecting
//! - `status`: Show remembered address and configuration
//!
//! ## Example
//!
//! ```bash
//! # Connect to 192.168.1.5 on the default port
//! writerlink run --address 5
//!
//! # Different port, verbose logs
//! RUST_LOG=debug writerlink --port 20000 run
//!
//! # Check what an address expands to
//! writerlink normalize "10。0。0。7"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use sync_client::ClientConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod terminal;

use commands::{normalize, run, status};

/// Config file looked up in the data directory when `--config` is absent.
const CONFIG_FILE: &str = "writerlink.toml";

/// Desktop companion for a phone writing app.
#[derive(Parser, Debug)]
#[command(name = "writerlink")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: writerlink.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for settings
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Port the phone listens on (overrides the config file)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive session
    Run {
        /// Connect to this address on startup
        #[arg(long, short)]
        address: Option<String>,
    },

    /// Normalize and validate an address without connecting
    Normalize {
        /// Address as typed, e.g. "5" or "192。168。1。5"
        raw: String,
    },

    /// Show remembered address and effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Normalize { raw } = &cli.command {
        return normalize::run(raw);
    }

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config_path = cli.config.unwrap_or_else(|| data_dir.join(CONFIG_FILE));
    let config = load_config(&config_path, cli.port).await?;

    match cli.command {
        Commands::Run { address } => {
            run::run(&data_dir, config, address).await?;
        }
        Commands::Status => {
            status::run(&data_dir, &config).await?;
        }
        Commands::Normalize { .. } => {}
    }

    Ok(())
}

/// Load the config file (defaults if absent) and apply flag overrides.
async fn load_config(path: &Path, port: Option<u16>) -> Result<ClientConfig> {
    let mut config = ClientConfig::load_or_default(path)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    if let Some(port) = port {
        config.connection.port = port;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Get the default data directory for writerlink.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "writerlink", "writerlink")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
