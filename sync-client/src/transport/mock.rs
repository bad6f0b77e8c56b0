//! Mock transport for testing.
//!
//! Allows queueing frames, holding connect attempts open and capturing
//! sent frames for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync_types::{Frame, SyncError};
use tokio::sync::{watch, Notify};

/// Mock transport for testing.
///
/// Clones share state. `recv()` waits for queued data like a real
/// connection and returns an error once the connection goes away.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    /// Wakes pending `recv()` calls on new data or disconnect.
    incoming: Arc<Notify>,
    /// `false` while connect attempts are held open.
    gate: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    connected_port: Option<u16>,
    connect_count: usize,
    close_count: usize,
    sent_messages: Vec<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    connect_failures: VecDeque<String>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner::default())),
            incoming: Arc::new(Notify::new()),
            gate: Arc::new(gate),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue raw data to be returned by a `recv()` call.
    pub fn queue_response(&self, data: Vec<u8>) {
        self.lock().receive_queue.push_back(data);
        self.incoming.notify_waiters();
    }

    /// Encode and queue a frame as if the peer had sent it.
    pub fn queue_frame(&self, frame: &Frame) -> Result<(), SyncError> {
        self.queue_response(frame.to_bytes()?);
        Ok(())
    }

    /// Get all raw messages that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        self.lock().sent_messages.clone()
    }

    /// Sent messages decoded as frames. Undecodable data is skipped.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.lock()
            .sent_messages
            .iter()
            .filter_map(|data| Frame::from_bytes(data).ok())
            .collect()
    }

    /// Get the last message that was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.lock().sent_messages.last().cloned()
    }

    /// Get the address of the current or last connection.
    pub fn connected_address(&self) -> Option<String> {
        self.lock().connected_address.clone()
    }

    /// Get the port of the current or last connection.
    pub fn connected_port(&self) -> Option<u16> {
        self.lock().connected_port
    }

    /// Number of `connect()` calls so far, including held and failed ones.
    pub fn connect_count(&self) -> usize {
        self.lock().connect_count
    }

    /// Number of `close()` calls so far.
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    /// Cause the next connect() to fail with the given error.
    ///
    /// Calls accumulate: two calls fail the next two attempts.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().connect_failures.push_back(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Cause the next recv() to fail with the given error.
    pub fn fail_next_recv(&self, error: &str) {
        self.lock().fail_next_recv = Some(error.to_string());
    }

    /// Hold every subsequent connect() open until [`release_connects`](Self::release_connects).
    pub fn hold_connects(&self) {
        self.gate.send_replace(false);
    }

    /// Let held connect() calls complete.
    pub fn release_connects(&self) {
        self.gate.send_replace(true);
    }

    /// Drop the connection as if the peer went away.
    pub fn simulate_disconnect(&self) {
        self.lock().connected = false;
        self.incoming.notify_waiters();
    }

    /// Clear all state (messages, queue, connection, counters).
    pub fn reset(&self) {
        *self.lock() = MockTransportInner::default();
        self.gate.send_replace(true);
        self.incoming.notify_waiters();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str, port: u16) -> Result<(), TransportError> {
        self.lock().connect_count += 1;

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(TransportError::ConnectionFailed("transport dropped".into()));
        }

        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.connect_failures.pop_front() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        inner.connected_port = Some(port);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_messages.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut waited = false;
        loop {
            // Register interest before checking so a notify in between is kept
            let notified = self.incoming.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();

                if !inner.connected {
                    return Err(if waited {
                        TransportError::ConnectionClosed
                    } else {
                        TransportError::NotConnected
                    });
                }

                // Check for forced failure
                if let Some(error) = inner.fail_next_recv.take() {
                    return Err(TransportError::ReceiveFailed(error));
                }

                if let Some(data) = inner.receive_queue.pop_front() {
                    return Ok(data);
                }
            }

            notified.await;
            waited = true;
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        {
            let mut inner = self.lock();
            inner.connected = false;
            inner.close_count += 1;
        }
        self.incoming.notify_waiters();
        Ok(())
    }
}
