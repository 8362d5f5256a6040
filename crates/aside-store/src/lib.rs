//! # aside-store
//!
//! The chat-store boundary of the aside engine.
//!
//! The hosting application owns the conversation log; this crate defines the
//! [`ChatStore`] trait the engine reads and mutates through, an in-memory
//! reference implementation used by tests and embedders without their own
//! store, and the [`persist::CoalescingWriter`] that collapses bursts of
//! result updates into single flushes across ordered fallback channels.

#![deny(unsafe_code)]

pub mod memory;
pub mod persist;

use aside_core::ids::{MessageId, Position, VariantId};
use aside_core::message::ChatMessage;
use aside_core::result::{ResultKey, StoredResult};
use thiserror::Error;

/// Storage operation failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No message at the given position.
    #[error("no message at position {0}")]
    MessageNotFound(Position),

    /// The message exists but the variant does not.
    #[error("no variant {variant} on message {position}")]
    VariantNotFound {
        /// Message position.
        position: Position,
        /// Missing variant.
        variant: VariantId,
    },
}

/// Ordered, mutable conversation log with per-variant result metadata.
///
/// The engine only ever reads messages and mutates variant metadata and
/// content; log structure (append, variant switching, regeneration) is driven
/// by the host.
pub trait ChatStore: Send + Sync {
    /// Number of messages in the log.
    fn message_count(&self) -> usize;

    /// Snapshot of the message at a position.
    fn message(&self, position: Position) -> Option<ChatMessage>;

    /// Position of the most recent message, if any.
    fn last_position(&self) -> Option<Position>;

    /// Find a message by stable id.
    fn find_by_id(&self, id: &MessageId) -> Option<ChatMessage>;

    /// Insert or overwrite the stored result at a key. Last write wins.
    fn upsert_result(&self, key: &ResultKey, result: StoredResult) -> Result<(), StoreError>;

    /// Remove and return the stored result at a key.
    fn delete_result(&self, key: &ResultKey) -> Result<Option<StoredResult>, StoreError>;

    /// Stored result at a key, if any.
    fn result(&self, key: &ResultKey) -> Option<StoredResult>;

    /// Replace the primary content of one variant.
    fn set_content(
        &self,
        position: Position,
        variant: VariantId,
        content: String,
    ) -> Result<(), StoreError>;
}
