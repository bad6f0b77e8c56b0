//! Transport abstraction for WriterLink.
//!
//! This module provides a pluggable transport layer that abstracts the
//! underlying connection mechanism (TCP on the local network, mock for
//! testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection
//! - `send()` transmits one encoded frame
//! - `recv()` receives one encoded frame
//! - `close()` gracefully terminates
//!
//! Framing (length prefixes) is the transport's business; callers deal in
//! whole frame bodies.
//!
//! # Example
//!
//! ```ignore
//! let transport = TcpTransport::new();
//! transport.connect("192.168.1.5", 19621).await?;
//! transport.send(&Frame::Ping.to_bytes()?).await?;
//! let reply = transport.recv().await?;
//! ```

mod mock;
mod tcp;

pub use mock::MockTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Frame exceeds the size limit.
    #[error("frame too large: {size} bytes (limit: {limit} bytes)")]
    FrameTooLarge {
        /// Announced frame size.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },
}

/// Transport trait for exchanging frames with the peer.
///
/// Implementations handle the underlying connection mechanism
/// (TCP, mock, etc).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the peer at `address:port`.
    ///
    /// Connecting while already connected replaces the old connection.
    async fn connect(&self, address: &str, port: u16) -> Result<(), TransportError>;

    /// Send one frame body over the connection.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive one frame body from the connection.
    ///
    /// Waits until data is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
