//! # sync-core
//!
//! Pure logic for WriterLink (no I/O, instant tests).
//!
//! This crate implements the state machines and decisions of a sync session
//! without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (network, disk, presentation) is performed by `sync-client`,
//! which interprets the actions and effects produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod document;
pub mod guard;
pub mod heartbeat;
pub mod session;
pub mod state;
pub mod view;

pub use address::{normalize, AddressRejected, ValidAddress, DEFAULT_PORT, DEFAULT_SUBNET_PREFIX};
pub use document::{Document, UNTITLED};
pub use guard::{decide, Decision, Field, FieldValue, Origin, SyncGuard};
pub use heartbeat::{HeartbeatDecision, DEFAULT_HEARTBEAT_INTERVAL};
pub use session::{Effect, SyncSession};
pub use state::{Action, ConnectionEvent, ConnectionState, Event, MAX_CONNECT_ATTEMPTS};
pub use view::{window_title, ViewState, ViewTrigger, DEFAULT_WINDOW_TITLE};
