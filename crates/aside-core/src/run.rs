//! Ephemeral per-session run state.
//!
//! Everything that used to be a free-floating module global in the observed
//! behavior (last-processed ids, queued triggers, pending events) lives here
//! as fields of one value owned by the orchestrator.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{Fingerprint, MessageId, Position, TaskId, VariantId};

/// Heterogeneous event notification, resolved once by the event resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum EventPayload {
    /// A numeric log position, used directly.
    Position {
        /// The notified position.
        position: Position,
    },
    /// A message-like object, matched by identity lookup in the log.
    Message {
        /// Stable message id to look up.
        id: MessageId,
    },
    /// Nothing usable attached; caller falls back to the most recent message.
    Empty,
}

/// The (position, variant, fingerprint) triple committed after a successful
/// run. Executed at most once until the fingerprint changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedRun {
    /// Message position.
    pub position: Position,
    /// Variant that was processed.
    pub variant: VariantId,
    /// Generation fingerprint at processing time.
    pub fingerprint: Fingerprint,
}

/// Ephemeral state of the scheduler state machine. One per session.
#[derive(Debug, Default)]
pub struct RunState {
    /// Mutual exclusion flag: true while a run is active.
    pub busy: bool,
    /// Single pending-event slot, overwritten (not queued) while busy.
    pub pending: Option<EventPayload>,
    /// Trigger-mode task ids queued for the next assistant turn.
    pub queued_triggers: BTreeSet<TaskId>,
    /// Last committed triple, None until the first successful run.
    pub last_committed: Option<CommittedRun>,
}

impl RunState {
    /// Fresh idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given triple equals the last committed one.
    #[must_use]
    pub fn is_duplicate(&self, triple: &CommittedRun) -> bool {
        self.last_committed.as_ref() == Some(triple)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
