//! TCP transport for the local network.
//!
//! Frames are prefixed with their length as a 4-byte big-endian integer.
//! The stream is split so a pending `recv()` never blocks `send()`.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use sync_types::MAX_FRAME_SIZE;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};

/// Length-prefixed frame transport over a TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
    /// `true` while there is no usable connection; wakes pending readers.
    closed: watch::Sender<bool>,
}

impl TcpTransport {
    /// Create an unconnected transport.
    pub fn new() -> Self {
        let (closed, _) = watch::channel(true);
        Self {
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
            closed,
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(read_error)?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(read_error)?;
    Ok(body)
}

fn read_error(e: std::io::Error) -> TransportError {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted => TransportError::ConnectionClosed,
        _ => TransportError::ReceiveFailed(e.to_string()),
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, address: &str, port: u16) -> Result<(), TransportError> {
        let stream = TcpStream::connect((address, port))
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{address}:{port}: {e}")))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }
        let (read_half, write_half) = stream.into_split();

        // Release any reader still parked on a previous connection
        self.closed.send_replace(true);
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        self.closed.send_replace(false);
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("TCP connected to {}:{}", address, port);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: data.len(),
                limit: MAX_FRAME_SIZE,
            });
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let len = (data.len() as u32).to_be_bytes();
        let result = async {
            writer.write_all(&len).await?;
            writer.write_all(data).await
        }
        .await;

        result.map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            TransportError::SendFailed(e.to_string())
        })
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(TransportError::NotConnected);
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(TransportError::NotConnected)?;

        tokio::select! {
            result = read_frame(reader) => {
                if result.is_err() {
                    self.connected.store(false, Ordering::SeqCst);
                }
                result
            }
            _ = closed.wait_for(|closed| *closed) => Err(TransportError::ConnectionClosed),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.closed.send_replace(true);

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("TCP shutdown error: {}", e);
            }
        }
        self.reader.lock().await.take();
        Ok(())
    }
}
