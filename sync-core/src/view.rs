//! View selection and window title composition.
//!
//! The presentation layer shows one of three screens. This is independent of
//! the connection state machine: a connected session still shows the connect
//! prompt until the first article arrives.

/// Window title when no document is loaded.
pub const DEFAULT_WINDOW_TITLE: &str = "WriterLink";

/// Separator between the title and the word count in the window title.
const TITLE_SEPARATOR: &str = " · ";

/// Which screen the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    /// Connected, but the remote has no document open.
    Empty,
    /// Address prompt; shown until a document arrives.
    #[default]
    AwaitingConnection,
    /// A document is loaded and editable.
    Editing,
}

/// Inputs that move the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTrigger {
    /// The remote sent a document.
    ArticleReceived,
    /// The remote closed its document.
    EmptyArticleReceived,
    /// The transport reported the channel inactive.
    ChannelInactive,
    /// The heartbeat found the channel inactive.
    LivenessLost,
}

impl ViewState {
    /// Next view for a trigger.
    pub fn on_trigger(self, trigger: ViewTrigger) -> Self {
        match trigger {
            ViewTrigger::ArticleReceived => Self::Editing,
            ViewTrigger::EmptyArticleReceived => Self::Empty,
            ViewTrigger::ChannelInactive | ViewTrigger::LivenessLost => Self::AwaitingConnection,
        }
    }
}

/// Compose the window title.
///
/// `"{title} · {word_count}"` when both are known, the bare title when only
/// the title is known, and [`DEFAULT_WINDOW_TITLE`] when no document is loaded.
pub fn window_title(title: Option<&str>, word_count: Option<&str>) -> String {
    match (title, word_count) {
        (Some(title), Some(count)) => format!("{title}{TITLE_SEPARATOR}{count}"),
        (Some(title), None) => title.to_string(),
        (None, _) => DEFAULT_WINDOW_TITLE.to_string(),
    }
}
