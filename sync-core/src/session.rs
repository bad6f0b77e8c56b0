//! Session facade - the pure heart of a sync session.
//!
//! [`SyncSession`] owns the local document copy, the echo guard and the view
//! selector. Like [`ConnectionState`](crate::ConnectionState) it performs no
//! I/O: every entry point returns a list of [`Effect`]s for sync-client to
//! carry out, in order.
//!
//! All methods take `&mut self`, so arming the guard (remote apply) and
//! consulting it (local-change listener) necessarily happen on whichever
//! single context owns the session.

use sync_types::Message;

use crate::document::Document;
use crate::guard::{decide, Decision, Field, FieldValue, SyncGuard};
use crate::heartbeat::HeartbeatDecision;
use crate::view::{window_title, ViewState, ViewTrigger};

/// Side effects requested by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Push the document into the editor. Field listeners fire as a result
    /// and must be routed back through [`SyncSession::on_local_change`].
    Render(Document),
    /// Update the window title.
    SetWindowTitle(String),
    /// Switch the visible screen.
    ShowView(ViewState),
    /// Send the full document to the remote.
    Transmit(Document),
    /// Send a heartbeat ping.
    Ping,
    /// Tell the connection manager the channel is gone.
    ChannelLost,
}

/// The per-process sync session.
#[derive(Debug, Default)]
pub struct SyncSession {
    document: Document,
    guard: SyncGuard,
    view: ViewState,
    word_count: Option<String>,
}

impl SyncSession {
    /// A fresh session: empty document, connect prompt showing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current local document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Current view.
    pub fn view(&self) -> ViewState {
        self.view
    }

    /// The guard, for inspection.
    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    /// Window title for the current state.
    pub fn window_title(&self) -> String {
        if self.view == ViewState::Editing {
            window_title(Some(&self.document.title), self.word_count.as_deref())
        } else {
            window_title(None, None)
        }
    }

    /// A field listener observed a change in the editor.
    pub fn on_local_change(&mut self, value: FieldValue, is_active: bool) -> Vec<Effect> {
        let origin = self.guard.observe(&value);
        match decide(origin, is_active) {
            Decision::ShowReconnect => self.fall_back(ViewTrigger::LivenessLost),
            Decision::Suppress => vec![],
            Decision::Transmit => {
                let field = value.field();
                self.document.set(value);
                let mut effects = vec![Effect::Transmit(self.document.clone())];
                if field == Field::Title && self.view == ViewState::Editing {
                    effects.push(Effect::SetWindowTitle(self.window_title()));
                }
                effects
            }
        }
    }

    /// A message arrived from the bus.
    pub fn on_remote_message(&mut self, message: Message) -> Vec<Effect> {
        match message {
            // Wait for the article before leaving the prompt
            Message::ChannelActive(active) if active.active => vec![],
            Message::ChannelActive(_) => self.fall_back(ViewTrigger::ChannelInactive),
            Message::Article(article) => {
                self.word_count = None;
                let mut effects = self.replace_document(Document::from_article(&article));
                effects.extend(self.move_view(ViewTrigger::ArticleReceived));
                effects.push(Effect::SetWindowTitle(self.window_title()));
                effects
            }
            Message::WordCount(count) => {
                self.word_count = Some(count.text);
                if self.view == ViewState::Editing {
                    vec![Effect::SetWindowTitle(self.window_title())]
                } else {
                    vec![]
                }
            }
            Message::EmptyArticle(_) => {
                self.word_count = None;
                let mut effects = self.replace_document(Document::empty());
                effects.extend(self.move_view(ViewTrigger::EmptyArticleReceived));
                effects.push(Effect::SetWindowTitle(self.window_title()));
                effects
            }
        }
    }

    /// A heartbeat tick, with the channel's current liveness.
    pub fn on_heartbeat(&mut self, is_active: bool) -> Vec<Effect> {
        match HeartbeatDecision::for_tick(is_active) {
            HeartbeatDecision::Ping => vec![Effect::Ping],
            HeartbeatDecision::LivenessLost => self.fall_back(ViewTrigger::LivenessLost),
        }
    }

    /// Arm every field, then swap in the new document.
    fn replace_document(&mut self, document: Document) -> Vec<Effect> {
        self.guard.arm_all(document.field_values());
        self.document = document;
        vec![Effect::Render(self.document.clone())]
    }

    fn move_view(&mut self, trigger: ViewTrigger) -> Option<Effect> {
        let next = self.view.on_trigger(trigger);
        if next == self.view {
            return None;
        }
        self.view = next;
        Some(Effect::ShowView(next))
    }

    /// Back to the connect prompt. Idempotent apart from the `ChannelLost`
    /// notice, which the connection manager ignores when already idle.
    fn fall_back(&mut self, trigger: ViewTrigger) -> Vec<Effect> {
        let mut effects = vec![Effect::ChannelLost];
        let Some(show) = self.move_view(trigger) else {
            return effects;
        };
        self.word_count = None;
        effects.extend(self.replace_document(Document::empty()));
        effects.push(Effect::SetWindowTitle(self.window_title()));
        effects.push(show);
        effects
    }
}
