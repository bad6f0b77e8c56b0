//! Commands consumed by the session driver.
//!
//! Everything that reaches the foreground task arrives as a [`Command`]:
//! presentation input through [`SessionHandle`], heartbeat ticks and
//! connect completions from worker tasks.

use sync_core::FieldValue;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ConfigError;
use crate::connection::ConnectOutcome;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session driver has stopped.
    #[error("session closed")]
    SessionClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Work item for the foreground task.
#[derive(Debug)]
pub enum Command {
    /// Raw text from the address prompt.
    SubmitAddress(String),
    /// A field listener fired in the editor.
    LocalChange(FieldValue),
    /// The heartbeat period elapsed.
    HeartbeatTick,
    /// A connect attempt finished.
    ConnectCompleted(ConnectOutcome),
    /// Stop the session.
    Shutdown,
}

/// Cloneable handle for feeding the session from the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Submit raw address text. Invalid text is ignored by the session.
    pub fn submit_address(&self, raw: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::SubmitAddress(raw.into()))
    }

    /// Report a change observed in the editor.
    pub fn local_change(&self, value: FieldValue) -> Result<(), ClientError> {
        self.send(Command::LocalChange(value))
    }

    /// Ask the session to dispose its connection and stop.
    pub fn shutdown(&self) -> Result<(), ClientError> {
        self.send(Command::Shutdown)
    }

    pub(crate) fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::SessionClosed)
    }

    /// True once the driver has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_forwards_commands_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(tx);

        handle.submit_address("5").unwrap();
        handle
            .local_change(FieldValue::Title("Draft".into()))
            .unwrap();
        handle.shutdown().unwrap();

        assert!(matches!(rx.recv().await, Some(Command::SubmitAddress(a)) if a == "5"));
        assert!(matches!(rx.recv().await, Some(Command::LocalChange(FieldValue::Title(t))) if t == "Draft"));
        assert!(matches!(rx.recv().await, Some(Command::Shutdown)));
    }

    #[tokio::test]
    async fn closed_session_reported() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(tx);
        drop(rx);

        assert!(handle.is_closed());
        assert!(matches!(
            handle.submit_address("1"),
            Err(ClientError::SessionClosed)
        ));
    }
}
