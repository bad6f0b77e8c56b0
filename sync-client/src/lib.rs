//! # sync-client
//!
//! Session engine for WriterLink, the desktop companion that mirrors a
//! document open on a phone over the local network.
//!
//! This crate performs the I/O that `sync-core` describes: it owns the
//! transport, the heartbeat timer, the in-process message bus and persisted
//! settings, and drives one [`SyncSession`](sync_core::SyncSession) from a
//! single foreground task.
//!
//! ## Features
//!
//! - **Echo-safe sync**: remote applies never bounce back to the phone
//! - **Connection management**: deduplicated attempts, one automatic retry
//! - **Heartbeat**: liveness loss returns the UI to the connect prompt
//! - **Transport Abstraction**: Pluggable transport layer (TCP, mock)
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_client::{ClientConfig, FileSettings, MessageBus, SessionDriver, TcpTransport};
//!
//! let config = ClientConfig::default();
//! let bus = MessageBus::new(config.bus.capacity);
//! let settings = Arc::new(FileSettings::in_dir(&data_dir));
//! let (driver, handle) =
//!     SessionDriver::new(config, Arc::new(TcpTransport::new()), presenter, settings, bus)?;
//!
//! tokio::spawn(driver.run());
//! handle.submit_address("5")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod command;
pub mod config;
pub mod connection;
pub mod driver;
pub mod heartbeat;
pub mod presenter;
pub mod settings;
pub mod transport;

pub use bus::{MessageBus, Subscription, Topic};
pub use command::{ClientError, Command, SessionHandle};
pub use config::{BusConfig, ClientConfig, ConfigError, ConnectionConfig, HeartbeatConfig};
pub use connection::{ConnectOutcome, ConnectionManager};
pub use driver::SessionDriver;
pub use heartbeat::spawn_heartbeat;
pub use presenter::{EditorFields, Presenter};
pub use settings::{FileSettings, MemorySettings, SettingsError, SettingsStore, SETTINGS_FILE};
pub use transport::{MockTransport, TcpTransport, Transport, TransportError};
