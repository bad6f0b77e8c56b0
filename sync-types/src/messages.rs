//! Inbound session messages.
//!
//! These are the typed events the transport delivers onto the message bus.
//! Exactly one variant is active per [`Message`] and messages are immutable
//! once constructed.

use serde::{Deserialize, Serialize};

/// All messages that can reach the session from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Channel liveness transition
    ChannelActive(ChannelActive),
    /// Full document snapshot from the remote
    Article(ArticleMessage),
    /// Display-only word count text
    WordCount(WordCountMessage),
    /// The remote has no open document
    EmptyArticle(EmptyArticleMessage),
}

impl Message {
    /// Short variant name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ChannelActive(_) => "channel_active",
            Message::Article(_) => "article",
            Message::WordCount(_) => "word_count",
            Message::EmptyArticle(_) => "empty_article",
        }
    }
}

impl From<ChannelActive> for Message {
    fn from(msg: ChannelActive) -> Self {
        Message::ChannelActive(msg)
    }
}

impl From<ArticleMessage> for Message {
    fn from(msg: ArticleMessage) -> Self {
        Message::Article(msg)
    }
}

impl From<WordCountMessage> for Message {
    fn from(msg: WordCountMessage) -> Self {
        Message::WordCount(msg)
    }
}

impl From<EmptyArticleMessage> for Message {
    fn from(msg: EmptyArticleMessage) -> Self {
        Message::EmptyArticle(msg)
    }
}

/// Liveness transition of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelActive {
    /// Whether the channel became active (`true`) or inactive (`false`).
    pub active: bool,
    /// Channel the transition belongs to. A replacement channel always has a
    /// higher id than the one it replaced.
    pub channel: u64,
}

/// Full document snapshot sent by the remote.
#[derive(Clone, PartialEq, Eq)]
pub struct ArticleMessage {
    /// Document title (may be empty)
    pub title: String,
    /// Document body
    pub content: String,
    /// Selection start, in characters
    pub selection_start: u32,
    /// Selection end, in characters
    pub selection_end: u32,
}

impl ArticleMessage {
    /// The selection carried by this snapshot.
    pub fn selection(&self) -> Selection {
        Selection::new(self.selection_start, self.selection_end)
    }
}

impl std::fmt::Debug for ArticleMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleMessage")
            .field("title", &self.title)
            .field(
                "content",
                &format!("[{} chars REDACTED]", self.content.chars().count()),
            )
            .field("selection_start", &self.selection_start)
            .field("selection_end", &self.selection_end)
            .finish()
    }
}

/// Word count text for the window title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordCountMessage {
    /// Preformatted counter text.
    pub text: String,
}

/// The remote has no article open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmptyArticleMessage;

/// A text selection range, in characters.
///
/// `start` may be greater than `end` for backwards selections; the range is
/// kept exactly as the editor reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Selection {
    /// Anchor position
    pub start: u32,
    /// Caret position
    pub end: u32,
}

impl Selection {
    /// Create a selection.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A collapsed selection (caret) at `pos`.
    pub fn caret(pos: u32) -> Self {
        Self::new(pos, pos)
    }

    /// Whether the selection covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Clamp both ends to `len` characters.
    pub fn clamp_to(self, len: u32) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_from_payloads() {
        let msg: Message = ChannelActive {
            active: true,
            channel: 1,
        }
        .into();
        assert_eq!(msg.kind(), "channel_active");

        let msg: Message = EmptyArticleMessage.into();
        assert_eq!(msg, Message::EmptyArticle(EmptyArticleMessage));

        let msg: Message = WordCountMessage {
            text: "42 words".into(),
        }
        .into();
        assert_eq!(msg.kind(), "word_count");
    }

    #[test]
    fn article_selection() {
        let article = ArticleMessage {
            title: "T".into(),
            content: "Content".into(),
            selection_start: 2,
            selection_end: 4,
        };
        assert_eq!(article.selection(), Selection::new(2, 4));
    }

    #[test]
    fn selection_clamps_to_length() {
        assert_eq!(Selection::new(3, 10).clamp_to(5), Selection::new(3, 5));
        assert_eq!(Selection::new(8, 9).clamp_to(5), Selection::caret(5));
        assert_eq!(Selection::new(1, 2).clamp_to(5), Selection::new(1, 2));
    }

    #[test]
    fn caret_is_empty() {
        assert!(Selection::caret(7).is_empty());
        assert!(!Selection::new(1, 2).is_empty());
    }

    #[test]
    fn selection_serde_json() {
        let json = serde_json::to_string(&Selection::new(1, 5)).unwrap();
        assert_eq!(json, r#"{"start":1,"end":5}"#);
    }

    #[test]
    fn article_debug_redacts_content() {
        let article = ArticleMessage {
            title: "Diary".into(),
            content: "very private words".into(),
            selection_start: 0,
            selection_end: 0,
        };
        let debug = format!("{:?}", article);
        assert!(
            debug.contains("[18 chars REDACTED]"),
            "content should be redacted, got: {}",
            debug
        );
        assert!(!debug.contains("private"));
        assert!(debug.contains("Diary"));
    }
}
