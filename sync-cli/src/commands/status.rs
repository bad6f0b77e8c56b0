//! Show remembered address and effective configuration.

use anyhow::{Context, Result};
use std::path::Path;
use sync_client::{ClientConfig, FileSettings, SettingsStore};

/// Run the status command.
pub async fn run(data_dir: &Path, config: &ClientConfig) -> Result<()> {
    let settings = FileSettings::in_dir(data_dir);
    let remembered = settings
        .last_address()
        .await
        .context("Failed to read settings")?;

    println!("=== writerlink status ===");
    println!();
    println!("Data directory: {}", data_dir.display());
    println!("Settings file:  {}", settings.path().display());
    match remembered {
        Some(address) => println!("Last address:   {}", address),
        None => println!("Last address:   (none yet)"),
    }
    println!();
    println!("Connection:");
    println!("  Port:           {}", config.connection.port);
    println!("Heartbeat:");
    println!("  Interval:       {} ms", config.heartbeat.interval_ms);
    println!("  Auto-reconnect: {}", config.heartbeat.auto_reconnect);
    println!("Bus:");
    println!("  Capacity:       {}", config.bus.capacity);

    Ok(())
}
