//! Sidecar task definitions.
//!
//! A [`TaskDefinition`] ("addon") is created and edited by the hosting
//! configuration UI and is read-only to this engine. The modes here drive the
//! scheduler (trigger mode), the execution coordinator (request mode) and the
//! projection manager (response location).

use serde::{Deserialize, Serialize};

use crate::ids::TaskId;

/// When a task becomes eligible to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Runs on every new assistant turn.
    Auto,
    /// Runs on the assistant turn following a matching user turn.
    Trigger,
    /// Runs only via the manual entrypoint.
    Manual,
}

/// How trigger patterns are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Case-insensitive substring containment.
    Keyword,
    /// Case-insensitive regular expression.
    Regex,
}

/// Pattern rules evaluated against user turns. OR semantics: any match fires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Pattern interpretation.
    pub kind: TriggerKind,
    /// Ordered, non-empty pattern list.
    pub patterns: Vec<String>,
}

impl TriggerConfig {
    /// Keyword config from a pattern list.
    #[must_use]
    pub fn keywords<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: TriggerKind::Keyword,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Regex config from a pattern list.
    #[must_use]
    pub fn regexes<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: TriggerKind::Regex,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

/// How the outbound provider call is shaped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum RequestMode {
    /// Combined with all same-key tasks into one batched call.
    Batch {
        /// Tasks sharing this key share one outbound call.
        key: String,
    },
    /// One outbound call per task.
    Standalone,
}

/// Where the result is projected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseLocation {
    /// Merged into the message's primary content, visible to the main flow.
    Inline,
    /// Rendered only in the UI-side region, invisible to the main flow.
    SideChannel,
}

/// Presentation style applied by the rendering layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatStyle {
    /// Plain prose block.
    #[default]
    Prose,
    /// Bulleted list block.
    Bullets,
    /// Raw, unstyled text.
    Raw,
}

/// Provider/model configuration for one task.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Provider identifier (opaque to this engine).
    #[serde(default)]
    pub provider: String,
    /// Model identifier.
    #[serde(default)]
    pub model: String,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A user-defined background analysis job driven by an AI prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    /// Stable task id.
    pub id: TaskId,
    /// Display name used in projected blocks.
    pub name: String,
    /// Disabled tasks are invisible to the scheduler.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// When the task becomes eligible.
    pub trigger_mode: TriggerMode,
    /// Pattern rules; only meaningful for [`TriggerMode::Trigger`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_config: Option<TriggerConfig>,
    /// Outbound call shaping.
    pub request_mode: RequestMode,
    /// Projection destination.
    pub response_location: ResponseLocation,
    /// Presentation style.
    #[serde(default)]
    pub format_style: FormatStyle,
    /// Provider/model configuration.
    #[serde(default)]
    pub model: ModelConfig,
}

fn default_enabled() -> bool {
    true
}

impl TaskDefinition {
    /// Batch key when this task participates in batching.
    #[must_use]
    pub fn batch_key(&self) -> Option<&str> {
        match &self.request_mode {
            RequestMode::Batch { key } => Some(key),
            RequestMode::Standalone => None,
        }
    }

    /// Whether results of this task are merged into primary content.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.response_location == ResponseLocation::Inline
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
