//! The locally held copy of the shared document.

use sync_types::{ArticleMessage, Selection};

use crate::guard::FieldValue;

/// Title used when the remote sends an article without one.
pub const UNTITLED: &str = "Untitled";

/// Current title, content and selection as shown locally.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    /// Document title.
    pub title: String,
    /// Document body.
    pub content: String,
    /// Selection range, in characters.
    pub selection: Selection,
}

impl Document {
    /// An empty document (nothing loaded).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the local copy of a remote snapshot.
    ///
    /// An empty title becomes [`UNTITLED`] and the selection is clamped to
    /// the content length.
    pub fn from_article(article: &ArticleMessage) -> Self {
        let title = if article.title.is_empty() {
            UNTITLED.to_string()
        } else {
            article.title.clone()
        };
        let len = u32::try_from(article.content.chars().count()).unwrap_or(u32::MAX);
        Self {
            title,
            content: article.content.clone(),
            selection: article.selection().clamp_to(len),
        }
    }

    /// Apply a single field value.
    pub fn set(&mut self, value: FieldValue) {
        match value {
            FieldValue::Title(v) => self.title = v,
            FieldValue::Content(v) => self.content = v,
            FieldValue::Selection(v) => self.selection = v,
        }
    }

    /// All three fields as values, in title/content/selection order.
    pub fn field_values(&self) -> [FieldValue; 3] {
        [
            FieldValue::Title(self.title.clone()),
            FieldValue::Content(self.content.clone()),
            FieldValue::Selection(self.selection),
        ]
    }
}
