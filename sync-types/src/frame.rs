//! Frame - the wire format spoken with the mobile peer.
//!
//! Frames are MessagePack maps tagged by `type`. The transport adds a 4-byte
//! big-endian length prefix; this module only deals with the frame body.

use serde::{Deserialize, Serialize};

use crate::{ArticleMessage, EmptyArticleMessage, Message, Selection, SyncError, WordCountMessage};

/// Maximum encoded frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// All frames exchanged over the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Full document snapshot (sent in both directions)
    Article {
        /// Document title
        title: String,
        /// Document body
        content: String,
        /// Selection start, in characters
        selection_start: u32,
        /// Selection end, in characters
        selection_end: u32,
    },
    /// Word count text
    WordCount {
        /// Preformatted counter text
        text: String,
    },
    /// No document open on the remote
    EmptyArticle,
    /// Heartbeat probe
    Ping,
    /// Heartbeat reply
    Pong,
}

impl Frame {
    /// Build an outbound article frame.
    pub fn article(title: &str, content: &str, selection: Selection) -> Self {
        Frame::Article {
            title: title.to_string(),
            content: content.to_string(),
            selection_start: selection.start,
            selection_end: selection.end,
        }
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let bytes = rmp_serde::to_vec_named(self).map_err(SyncError::Serialization)?;
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(SyncError::FrameTooLarge {
                size: bytes.len(),
                limit: MAX_FRAME_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(SyncError::FrameTooLarge {
                size: bytes.len(),
                limit: MAX_FRAME_SIZE,
            });
        }
        rmp_serde::from_slice(bytes).map_err(SyncError::Deserialization)
    }

    /// Convert an inbound frame into a bus message.
    ///
    /// Heartbeat frames carry no session data and map to `None`.
    pub fn into_message(self) -> Option<Message> {
        match self {
            Frame::Article {
                title,
                content,
                selection_start,
                selection_end,
            } => Some(Message::Article(ArticleMessage {
                title,
                content,
                selection_start,
                selection_end,
            })),
            Frame::WordCount { text } => Some(Message::WordCount(WordCountMessage { text })),
            Frame::EmptyArticle => Some(Message::EmptyArticle(EmptyArticleMessage)),
            Frame::Ping | Frame::Pong => None,
        }
    }
}
