//! Interactive session against a phone on the local network.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use sync_client::{ClientConfig, FileSettings, MessageBus, SessionDriver, TcpTransport};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::terminal::{print_document, Input, SharedScreen, TerminalPresenter, HELP};

/// Run an interactive session until `:quit`, end of input or Ctrl-C.
pub async fn run(data_dir: &Path, config: ClientConfig, address: Option<String>) -> Result<()> {
    let screen = SharedScreen::default();
    let presenter = TerminalPresenter::new(screen.clone());
    let settings = Arc::new(FileSettings::in_dir(data_dir));
    let bus = MessageBus::new(config.bus.capacity);

    let (driver, handle) = SessionDriver::new(
        config,
        Arc::new(TcpTransport::new()),
        presenter,
        settings,
        bus,
    )
    .context("Failed to start session")?;
    let session = tokio::spawn(driver.run());

    if let Some(address) = address {
        handle.submit_address(address)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match Input::parse(&line, screen.view()) {
                    Input::Connect(raw) => handle.submit_address(raw)?,
                    Input::Show => print_document(&screen.document()),
                    Input::Help => println!("{}", HELP),
                    Input::Quit => break,
                    Input::Unknown(line) => {
                        println!("Unknown command: {} (:help for commands)", line)
                    }
                    edit => {
                        if let Some(value) = screen.edit(&edit) {
                            handle.local_change(value)?;
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if handle.shutdown().is_err() {
        tracing::debug!("Session already stopped");
    }
    session.await.context("Session task failed")?;
    Ok(())
}
