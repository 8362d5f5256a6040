//! Stored sidecar results and their identity keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{Position, TaskId, VariantId};
use crate::task::FormatStyle;

/// Canonical identity of a stored result: (position, variant, task).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultKey {
    /// Message position in the log.
    pub position: Position,
    /// Variant the result is attached to.
    pub variant: VariantId,
    /// Task that produced the result.
    pub task: TaskId,
}

impl ResultKey {
    /// Build a key.
    #[must_use]
    pub fn new(position: Position, variant: VariantId, task: TaskId) -> Self {
        Self {
            position,
            variant,
            task,
        }
    }
}

impl std::fmt::Display for ResultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.position, self.variant, self.task)
    }
}

/// Canonical stored unit for one task's output on one variant.
///
/// Created on first successful run, overwritten on retry or regeneration,
/// deleted explicitly. Lives in the variant's metadata, not the primary text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    /// Sanitized result content.
    pub content: String,
    /// Display name of the producing task at store time.
    pub task_name: String,
    /// When the result was stored.
    pub timestamp: DateTime<Utc>,
    /// Presentation style.
    #[serde(default)]
    pub format_style: FormatStyle,
    /// Whether the result participates in the inline projection.
    #[serde(default)]
    pub inline: bool,
    /// Whether a user has hand-edited the content since it was stored.
    #[serde(default)]
    pub edited: bool,
}

impl StoredResult {
    /// Build a freshly generated (unedited) result stamped with now.
    #[must_use]
    pub fn generated(
        content: impl Into<String>,
        task_name: impl Into<String>,
        format_style: FormatStyle,
        inline: bool,
    ) -> Self {
        Self {
            content: content.into(),
            task_name: task_name.into(),
            timestamp: Utc::now(),
            format_style,
            inline,
            edited: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
