//! Chat message and variant model.
//!
//! The chat log itself is owned by the hosting application's chat store; this
//! crate only defines the value types the engine reads and whose per-variant
//! result metadata it mutates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{Fingerprint, MessageId, Position, TaskId, VariantId};
use crate::result::StoredResult;

/// Role of a chat log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A user turn.
    User,
    /// An assistant turn.
    Assistant,
}

/// One alternate generation occupying a message's slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Per-message variant index. May be reused after regeneration.
    pub id: VariantId,
    /// Primary text of this generation.
    pub content: String,
    /// Monotonic generation marker, bumped every time the content is
    /// regenerated — even when the variant id is reused.
    #[serde(default)]
    pub generation: u64,
    /// Sidecar results attached to this variant, keyed by task.
    #[serde(default)]
    pub results: BTreeMap<TaskId, StoredResult>,
}

impl Variant {
    /// Create a fresh variant at generation 0.
    #[must_use]
    pub fn new(id: VariantId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            generation: 0,
            results: BTreeMap::new(),
        }
    }

    /// Replace the content and bump the generation marker.
    pub fn regenerate(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.generation += 1;
    }
}

/// Ordered log entry with one or more variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Stable identity independent of position.
    pub id: MessageId,
    /// Stable index in the log.
    pub position: Position,
    /// Role of this entry.
    pub role: Role,
    /// Currently active variant id.
    pub active_variant: VariantId,
    /// All variants occupying this slot.
    pub variants: Vec<Variant>,
}

impl ChatMessage {
    /// Create a message with a single variant 0.
    #[must_use]
    pub fn new(position: Position, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            position,
            role,
            active_variant: VariantId::new(0),
            variants: vec![Variant::new(VariantId::new(0), content)],
        }
    }

    /// The currently active variant, if present.
    #[must_use]
    pub fn active(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == self.active_variant)
    }

    /// Mutable access to the currently active variant.
    pub fn active_mut(&mut self) -> Option<&mut Variant> {
        let id = self.active_variant;
        self.variants.iter_mut().find(|v| v.id == id)
    }

    /// Look up a variant by id.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Mutable lookup of a variant by id.
    pub fn variant_mut(&mut self, id: VariantId) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| v.id == id)
    }

    /// Fingerprint of the active variant's current generation.
    #[must_use]
    pub fn active_fingerprint(&self) -> Option<Fingerprint> {
        self.active()
            .map(|v| Fingerprint::derive(self.position, v.id, v.generation))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_has_variant_zero_active() {
        let msg = ChatMessage::new(Position::new(1), Role::Assistant, "hello");
        assert_eq!(msg.active_variant, VariantId::new(0));
        assert_eq!(msg.active().unwrap().content, "hello");
        assert_eq!(msg.active().unwrap().generation, 0);
    }

    #[test]
    fn regenerate_bumps_generation() {
        let mut msg = ChatMessage::new(Position::new(1), Role::Assistant, "v1");
        msg.active_mut().unwrap().regenerate("v2");
        let variant = msg.active().unwrap();
        assert_eq!(variant.content, "v2");
        assert_eq!(variant.generation, 1);
    }

    #[test]
    fn fingerprint_survives_variant_id_reuse() {
        let mut msg = ChatMessage::new(Position::new(2), Role::Assistant, "first");
        let before = msg.active_fingerprint().unwrap();
        // Same variant id, new content
        msg.active_mut().unwrap().regenerate("second");
        let after = msg.active_fingerprint().unwrap();
        assert_ne!(before, after);
        assert_eq!(msg.active_variant, VariantId::new(0));
    }

    #[test]
    fn variant_lookup() {
        let mut msg = ChatMessage::new(Position::new(1), Role::Assistant, "a");
        msg.variants.push(Variant::new(VariantId::new(1), "b"));
        assert_eq!(msg.variant(VariantId::new(1)).unwrap().content, "b");
        assert!(msg.variant(VariantId::new(9)).is_none());
    }

    #[test]
    fn active_missing_variant_is_none() {
        let mut msg = ChatMessage::new(Position::new(1), Role::Assistant, "a");
        msg.active_variant = VariantId::new(5);
        assert!(msg.active().is_none());
        assert!(msg.active_fingerprint().is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let msg = ChatMessage::new(Position::new(3), Role::User, "hi there");
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
