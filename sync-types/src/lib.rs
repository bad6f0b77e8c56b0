//! # sync-types
//!
//! Message and wire types for the WriterLink synchronization session.
//!
//! This crate provides the foundational types used across all WriterLink crates:
//! - [`Message`] - The closed union of inbound events delivered to the session
//! - [`Frame`] - The MessagePack wire codec spoken with the mobile peer
//! - [`Selection`] - A text selection range
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frame;
mod messages;

pub use error::SyncError;
pub use frame::{Frame, MAX_FRAME_SIZE};
pub use messages::{
    ArticleMessage, ChannelActive, EmptyArticleMessage, Message, Selection, WordCountMessage,
};
