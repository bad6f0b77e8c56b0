//! Echo suppression for remote-applied edits.
//!
//! Applying a remote snapshot to the local editor makes the editor's change
//! listeners fire, exactly as if the user had typed. Without a guard those
//! listeners would send the snapshot straight back to the remote, which would
//! echo it again, forever.
//!
//! The guard tags every observed change with an [`Origin`]:
//!
//! 1. before a remote value is applied, [`SyncGuard::arm`] records the value
//!    for its field
//! 2. the value is applied
//! 3. the field's listener calls [`SyncGuard::observe`], which always consumes
//!    the armed entry and reports [`Origin::RemoteApply`] only when the
//!    observed value is the one that was armed
//!
//! An armed entry lives for at most one observation, and a leftover entry can
//! only match the exact value the remote already has, so it can never swallow
//! a genuine local edit.

use sync_types::Selection;

/// A guarded document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Document title.
    Title,
    /// Document body.
    Content,
    /// Selection range.
    Selection,
}

/// A new value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// New title.
    Title(String),
    /// New body.
    Content(String),
    /// New selection.
    Selection(Selection),
}

impl FieldValue {
    /// Which field this value belongs to.
    pub fn field(&self) -> Field {
        match self {
            FieldValue::Title(_) => Field::Title,
            FieldValue::Content(_) => Field::Content,
            FieldValue::Selection(_) => Field::Selection,
        }
    }
}

/// Where an observed change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The user edited the document locally.
    LocalEdit,
    /// The change is the echo of a value applied from the remote.
    RemoteApply,
}

/// What a local-change listener should do with an observed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The channel is down; fall back to the connect prompt.
    ShowReconnect,
    /// Remote-caused; do not send.
    Suppress,
    /// Genuine local edit; send it.
    Transmit,
}

/// Decide what to do with a change of the given origin.
///
/// An inactive channel always wins over the origin.
pub fn decide(origin: Origin, is_active: bool) -> Decision {
    match (is_active, origin) {
        (false, _) => Decision::ShowReconnect,
        (true, Origin::RemoteApply) => Decision::Suppress,
        (true, Origin::LocalEdit) => Decision::Transmit,
    }
}

/// Per-field suppression state.
#[derive(Debug, Default)]
pub struct SyncGuard {
    title: Option<String>,
    content: Option<String>,
    selection: Option<Selection>,
}

impl SyncGuard {
    /// Create a guard with nothing armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm suppression for the value about to be applied to its field.
    ///
    /// Re-arming a field replaces the previous entry.
    pub fn arm(&mut self, value: FieldValue) {
        match value {
            FieldValue::Title(v) => self.title = Some(v),
            FieldValue::Content(v) => self.content = Some(v),
            FieldValue::Selection(v) => self.selection = Some(v),
        }
    }

    /// Arm several fields at once, before any of them is applied.
    pub fn arm_all(&mut self, values: impl IntoIterator<Item = FieldValue>) {
        for value in values {
            self.arm(value);
        }
    }

    /// Classify an observed change, consuming the field's armed entry.
    pub fn observe(&mut self, value: &FieldValue) -> Origin {
        let matched = match value {
            FieldValue::Title(v) => self.title.take().is_some_and(|armed| armed == *v),
            FieldValue::Content(v) => self.content.take().is_some_and(|armed| armed == *v),
            FieldValue::Selection(v) => self.selection.take().is_some_and(|armed| armed == *v),
        };
        if matched {
            Origin::RemoteApply
        } else {
            Origin::LocalEdit
        }
    }

    /// Whether a field currently has an armed entry.
    pub fn is_armed(&self, field: Field) -> bool {
        match field {
            Field::Title => self.title.is_some(),
            Field::Content => self.content.is_some(),
            Field::Selection => self.selection.is_some(),
        }
    }
}
