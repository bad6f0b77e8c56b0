//! Presentation boundary.
//!
//! The session never touches a UI toolkit. It tells a [`Presenter`] which
//! screen to show, what the window title is and which document to render.

use sync_core::{ConnectionEvent, Document, FieldValue, ViewState};

/// The presentation layer driven by the session.
///
/// All methods are called on the session's foreground task.
pub trait Presenter: Send {
    /// Switch the visible screen.
    fn show_view(&mut self, view: ViewState);

    /// Update the window title.
    fn set_window_title(&mut self, title: &str);

    /// Push a document into the editor.
    ///
    /// Returns the change notifications the editor's field listeners fired
    /// while applying it, in firing order. The session classifies them
    /// before anything else runs, which is what keeps remote applies from
    /// echoing. Editors that notify asynchronously may return nothing and
    /// report through [`SessionHandle::local_change`](crate::SessionHandle::local_change)
    /// instead.
    fn render(&mut self, document: &Document) -> Vec<FieldValue>;

    /// Pre-fill the address prompt.
    fn prefill_address(&mut self, address: &str);

    /// Connection lifecycle notice. Ignored by default.
    fn connection_changed(&mut self, _event: &ConnectionEvent) {}
}

/// Editor model that fires a notification for each field whose value
/// actually changes, the way text widgets do.
#[derive(Debug, Clone, Default)]
pub struct EditorFields {
    current: Document,
}

impl EditorFields {
    /// An empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// What the editor shows now.
    pub fn current(&self) -> &Document {
        &self.current
    }

    /// Replace the shown document, returning notifications for changed fields.
    pub fn apply(&mut self, document: &Document) -> Vec<FieldValue> {
        let fired: Vec<FieldValue> = document
            .field_values()
            .into_iter()
            .zip(self.current.field_values())
            .filter(|(next, shown)| next != shown)
            .map(|(next, _)| next)
            .collect();
        self.current = document.clone();
        fired
    }

    /// Apply a user edit to one field.
    pub fn edit(&mut self, value: FieldValue) -> FieldValue {
        self.current.set(value.clone());
        value
    }
}
