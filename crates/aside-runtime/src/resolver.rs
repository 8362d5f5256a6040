//! Event resolution.
//!
//! Event notifications arrive in heterogeneous shapes. Resolution maps them
//! to a concrete (position, message) pair once, up front, so the scheduler
//! only ever reasons about log coordinates. Resolution never errors; an
//! unresolvable payload yields an empty value and the caller falls back to
//! the most recent message.

use aside_core::ids::Position;
use aside_core::message::ChatMessage;
use aside_core::run::EventPayload;
use aside_store::ChatStore;
use tracing::debug;

/// Outcome of resolving one [`EventPayload`] against the log.
#[derive(Clone, Debug, Default)]
pub struct ResolvedEvent {
    /// Resolved position, when the payload carried one or one was found.
    pub position: Option<Position>,
    /// The message at that position, when it exists.
    pub message: Option<ChatMessage>,
}

/// Resolve an event payload against the chat store.
///
/// - `Position` payloads are used directly (the message lookup may still
///   miss if the position is out of range)
/// - `Message` payloads are matched by identity lookup in the log
/// - `Empty` payloads resolve to nothing
#[must_use]
pub fn resolve(payload: &EventPayload, store: &dyn ChatStore) -> ResolvedEvent {
    match payload {
        EventPayload::Position { position } => ResolvedEvent {
            position: Some(*position),
            message: store.message(*position),
        },
        EventPayload::Message { id } => match store.find_by_id(id) {
            Some(message) => ResolvedEvent {
                position: Some(message.position),
                message: Some(message),
            },
            None => {
                debug!(%id, "message probe not found in log");
                ResolvedEvent::default()
            }
        },
        EventPayload::Empty => ResolvedEvent::default(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
