//! In-memory reference chat store.

use parking_lot::RwLock;

use aside_core::ids::{MessageId, Position, VariantId};
use aside_core::message::{ChatMessage, Role, Variant};
use aside_core::result::{ResultKey, StoredResult};

use crate::{ChatStore, StoreError};

/// Reference [`ChatStore`] backed by a `RwLock<Vec<ChatMessage>>`.
///
/// Used by the test suites and by embedders without a native store. The
/// mutating helpers (`push`, `regenerate_active`, `set_active_variant`)
/// mimic the host-driven log operations.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    messages: RwLock<Vec<ChatMessage>>,
}

impl MemoryChatStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a greeting at position 0.
    #[must_use]
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let store = Self::new();
        let _ = store.push(Role::Assistant, greeting);
        store
    }

    /// Append a message and return its position.
    pub fn push(&self, role: Role, content: impl Into<String>) -> Position {
        let mut log = self.messages.write();
        let position = Position::new(log.len());
        log.push(ChatMessage::new(position, role, content));
        position
    }

    /// Replace the active variant's content, bumping its generation marker.
    pub fn regenerate_active(&self, position: Position, content: impl Into<String>) -> Result<(), StoreError> {
        let mut log = self.messages.write();
        let msg = log
            .get_mut(position.index())
            .ok_or(StoreError::MessageNotFound(position))?;
        let variant = msg.active_variant;
        msg.variant_mut(variant)
            .ok_or(StoreError::VariantNotFound { position, variant })?
            .regenerate(content);
        Ok(())
    }

    /// Add a variant to a message and make it active.
    pub fn add_variant(
        &self,
        position: Position,
        content: impl Into<String>,
    ) -> Result<VariantId, StoreError> {
        let mut log = self.messages.write();
        let msg = log
            .get_mut(position.index())
            .ok_or(StoreError::MessageNotFound(position))?;
        let next = msg
            .variants
            .iter()
            .map(|v| v.id.get())
            .max()
            .map_or(0, |m| m + 1);
        let id = VariantId::new(next);
        msg.variants.push(Variant::new(id, content));
        msg.active_variant = id;
        Ok(id)
    }

    /// Switch the active variant of a message.
    pub fn set_active_variant(
        &self,
        position: Position,
        variant: VariantId,
    ) -> Result<(), StoreError> {
        let mut log = self.messages.write();
        let msg = log
            .get_mut(position.index())
            .ok_or(StoreError::MessageNotFound(position))?;
        if msg.variant(variant).is_none() {
            return Err(StoreError::VariantNotFound { position, variant });
        }
        msg.active_variant = variant;
        Ok(())
    }

    fn with_variant<T>(
        &self,
        position: Position,
        variant: VariantId,
        f: impl FnOnce(&mut Variant) -> T,
    ) -> Result<T, StoreError> {
        let mut log = self.messages.write();
        let msg = log
            .get_mut(position.index())
            .ok_or(StoreError::MessageNotFound(position))?;
        let slot = msg
            .variant_mut(variant)
            .ok_or(StoreError::VariantNotFound { position, variant })?;
        Ok(f(slot))
    }
}

impl ChatStore for MemoryChatStore {
    fn message_count(&self) -> usize {
        self.messages.read().len()
    }

    fn message(&self, position: Position) -> Option<ChatMessage> {
        self.messages.read().get(position.index()).cloned()
    }

    fn last_position(&self) -> Option<Position> {
        let len = self.messages.read().len();
        len.checked_sub(1).map(Position::new)
    }

    fn find_by_id(&self, id: &MessageId) -> Option<ChatMessage> {
        self.messages.read().iter().find(|m| &m.id == id).cloned()
    }

    fn upsert_result(&self, key: &ResultKey, result: StoredResult) -> Result<(), StoreError> {
        self.with_variant(key.position, key.variant, |variant| {
            let _ = variant.results.insert(key.task.clone(), result);
        })
    }

    fn delete_result(&self, key: &ResultKey) -> Result<Option<StoredResult>, StoreError> {
        self.with_variant(key.position, key.variant, |variant| {
            variant.results.remove(&key.task)
        })
    }

    fn result(&self, key: &ResultKey) -> Option<StoredResult> {
        let log = self.messages.read();
        log.get(key.position.index())
            .and_then(|m| m.variant(key.variant))
            .and_then(|v| v.results.get(&key.task))
            .cloned()
    }

    fn set_content(
        &self,
        position: Position,
        variant: VariantId,
        content: String,
    ) -> Result<(), StoreError> {
        self.with_variant(position, variant, |v| v.content = content)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
