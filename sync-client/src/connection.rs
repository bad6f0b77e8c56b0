//! Connection manager.
//!
//! Interprets the actions of the pure [`ConnectionState`] machine: connect
//! attempts run as worker tasks and report back as
//! [`Command::ConnectCompleted`]; an open channel gets a reader task that
//! publishes inbound messages on the [`MessageBus`] and a writer task that
//! sends outbound frames in order.
//!
//! ```text
//! SessionDriver → ConnectionManager → Transport → Network
//!                        ↓                ↓
//!          sync-core (state machine)   MessageBus
//! ```
//!
//! The manager itself is owned by the foreground task and never blocks.

use std::sync::Arc;
use sync_core::{
    Action, ConnectionEvent, ConnectionState, Document, Event, ValidAddress, MAX_CONNECT_ATTEMPTS,
};
use sync_types::{ChannelActive, Frame, Message};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bus::MessageBus;
use crate::command::Command;
use crate::settings::SettingsStore;
use crate::transport::{Transport, TransportError};

/// Completion of one connect attempt.
#[derive(Debug)]
pub struct ConnectOutcome {
    generation: u64,
    address: ValidAddress,
    result: Result<(), TransportError>,
}

/// Reader and writer tasks of an open channel.
#[derive(Debug)]
struct Channel {
    /// Generation of the attempt that opened it.
    id: u64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Channel {
    fn shutdown(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Owns the connection lifecycle for one session.
pub struct ConnectionManager<T: Transport + 'static> {
    transport: Arc<T>,
    settings: Arc<dyn SettingsStore>,
    bus: MessageBus,
    port: u16,
    state: ConnectionState,
    /// Bumped per dispatched attempt; outcomes from older attempts are stale.
    generation: u64,
    attempt: Option<JoinHandle<()>>,
    channel: Option<Channel>,
    /// Teardown of the previous attempt or channel; awaited before connecting.
    closing: Option<JoinHandle<()>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl<T: Transport + 'static> ConnectionManager<T> {
    /// Create a manager. Connect outcomes are reported on `commands`.
    pub fn new(
        transport: Arc<T>,
        settings: Arc<dyn SettingsStore>,
        bus: MessageBus,
        port: u16,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            transport,
            settings,
            bus,
            port,
            state: ConnectionState::new(),
            generation: 0,
            attempt: None,
            channel: None,
            closing: None,
            commands,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// True only when connected and the transport reports the link open.
    pub fn is_active(&self) -> bool {
        self.state.is_connected() && self.transport.is_connected()
    }

    /// Request a connection. A repeat of the address in flight is a no-op.
    pub fn connect(&mut self, address: ValidAddress) -> Vec<ConnectionEvent> {
        self.apply(Event::ConnectRequested { address })
    }

    /// Feed back the result of a connect attempt.
    pub fn on_outcome(&mut self, outcome: ConnectOutcome) -> Vec<ConnectionEvent> {
        if outcome.generation != self.generation {
            tracing::debug!(
                "Ignoring stale connect outcome for {} (generation {}, current {})",
                outcome.address,
                outcome.generation,
                self.generation
            );
            return vec![];
        }
        self.attempt = None;

        let event = match outcome.result {
            Ok(()) => Event::ConnectSucceeded {
                address: outcome.address,
            },
            Err(e) => Event::ConnectFailed {
                address: outcome.address,
                error: e.to_string(),
            },
        };
        self.apply(event)
    }

    /// True when `message` reports the loss of a channel that has since been
    /// replaced by the one now open.
    pub fn is_superseded(&self, message: &Message) -> bool {
        match (message, &self.channel) {
            (Message::ChannelActive(signal), Some(open)) => {
                !signal.active && signal.channel != open.id
            }
            _ => false,
        }
    }

    /// The channel was found inactive.
    pub fn channel_lost(&mut self) -> Vec<ConnectionEvent> {
        self.apply(Event::ChannelLost)
    }

    /// Cancel any attempt and close any channel.
    pub fn dispose(&mut self) -> Vec<ConnectionEvent> {
        self.apply(Event::DisposeRequested)
    }

    /// Send the full document, fire-and-forget.
    pub fn send_document(&self, document: &Document) {
        self.send_frame(Frame::article(
            &document.title,
            &document.content,
            document.selection,
        ));
    }

    /// Send a heartbeat ping, fire-and-forget.
    pub fn ping(&self) {
        self.send_frame(Frame::Ping);
    }

    fn send_frame(&self, frame: Frame) {
        let Some(channel) = &self.channel else {
            tracing::debug!("No open channel, dropping outbound frame");
            return;
        };
        match frame.to_bytes() {
            Ok(bytes) => {
                if channel.outbound.send(bytes).is_err() {
                    tracing::warn!("Writer task gone, dropping outbound frame");
                }
            }
            Err(e) => tracing::warn!("Failed to encode outbound frame: {}", e),
        }
    }

    fn apply(&mut self, event: Event) -> Vec<ConnectionEvent> {
        let (state, actions) = std::mem::take(&mut self.state).on_event(event);
        self.state = state;

        let mut events = Vec::new();
        for action in actions {
            match action {
                Action::Connect { address, attempt } => self.dispatch(address, attempt),
                Action::CancelAttempt => self.cancel_attempt(),
                Action::CloseChannel => self.close_channel(),
                Action::PersistAddress { address } => self.persist(address),
                Action::EmitEvent(event) => {
                    self.report(&event);
                    events.push(event);
                }
            }
        }
        events
    }

    fn dispatch(&mut self, address: ValidAddress, attempt: u32) {
        self.generation += 1;
        let generation = self.generation;
        let port = self.port;
        let transport = Arc::clone(&self.transport);
        let commands = self.commands.clone();
        let closing = self.closing.take();

        tracing::info!(
            "Connecting to {}:{} (attempt {}/{})",
            address,
            port,
            attempt,
            MAX_CONNECT_ATTEMPTS
        );

        self.attempt = Some(tokio::spawn(async move {
            if let Some(closing) = closing {
                let _ = closing.await;
            }
            let result = transport.connect(address.as_str(), port).await;
            let outcome = ConnectOutcome {
                generation,
                address,
                result,
            };
            if commands.send(Command::ConnectCompleted(outcome)).is_err() {
                tracing::debug!("Session gone, dropping connect outcome");
            }
        }));
    }

    fn cancel_attempt(&mut self) {
        let Some(attempt) = self.attempt.take() else {
            return;
        };
        attempt.abort();
        tracing::debug!("Cancelled in-flight connect attempt");

        // The attempt may have connected before the abort landed
        let transport = Arc::clone(&self.transport);
        let previous = self.closing.take();
        self.closing = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let _ = attempt.await;
            if let Err(e) = transport.close().await {
                tracing::debug!("Close after cancel failed: {}", e);
            }
        }));
    }

    fn close_channel(&mut self) {
        let id = match self.channel.take() {
            Some(channel) => {
                let id = channel.id;
                channel.shutdown();
                id
            }
            None => self.generation,
        };
        self.bus.publish(ChannelActive {
            active: false,
            channel: id,
        });

        let transport = Arc::clone(&self.transport);
        let previous = self.closing.take();
        self.closing = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            if let Err(e) = transport.close().await {
                tracing::warn!("Failed to close channel: {}", e);
            }
        }));
    }

    fn open_channel(&mut self) {
        if let Some(stale) = self.channel.take() {
            stale.shutdown();
        }
        let id = self.generation;
        self.bus.publish(ChannelActive {
            active: true,
            channel: id,
        });

        let (outbound, mut queue) = mpsc::unbounded_channel::<Vec<u8>>();

        let transport = Arc::clone(&self.transport);
        let writer = tokio::spawn(async move {
            while let Some(bytes) = queue.recv().await {
                if let Err(e) = transport.send(&bytes).await {
                    tracing::warn!("Send failed: {}", e);
                }
            }
        });

        let transport = Arc::clone(&self.transport);
        let bus = self.bus.clone();
        let replies = outbound.clone();
        let reader = tokio::spawn(async move {
            loop {
                let bytes = match transport.recv().await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::info!("Channel closed: {}", e);
                        bus.publish(ChannelActive {
                            active: false,
                            channel: id,
                        });
                        break;
                    }
                };
                match Frame::from_bytes(&bytes) {
                    Ok(Frame::Ping) => match Frame::Pong.to_bytes() {
                        Ok(pong) => {
                            let _ = replies.send(pong);
                        }
                        Err(e) => tracing::warn!("Failed to encode pong: {}", e),
                    },
                    Ok(frame) => match frame.into_message() {
                        Some(message) => {
                            tracing::debug!("Received {} message", message.kind());
                            bus.publish(message);
                        }
                        None => tracing::trace!("Heartbeat reply"),
                    },
                    Err(e) => tracing::warn!("Dropping undecodable frame: {}", e),
                }
            }
        });

        self.channel = Some(Channel {
            id,
            reader,
            writer,
            outbound,
        });
    }

    fn persist(&self, address: ValidAddress) {
        let settings = Arc::clone(&self.settings);
        tokio::spawn(async move {
            match settings.set_last_address(&address).await {
                Ok(()) => tracing::debug!("Remembered address {}", address),
                Err(e) => tracing::warn!("Failed to persist address {}: {}", address, e),
            }
        });
    }

    fn report(&mut self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Connected { address } => {
                tracing::info!("Connected to {}", address);
                self.open_channel();
            }
            ConnectionEvent::RetryScheduled {
                address,
                attempt,
                error,
            } => tracing::warn!(
                "Connect to {} failed ({}), retrying (attempt {})",
                address,
                error,
                attempt
            ),
            ConnectionEvent::ConnectFailed { address, error } => {
                tracing::warn!("Giving up on {}: {}", address, error)
            }
            ConnectionEvent::Disconnected { address } => {
                tracing::info!("Disconnected from {}", address)
            }
        }
    }
}

impl<T: Transport + 'static> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        if let Some(channel) = self.channel.take() {
            channel.shutdown();
        }
    }
}
