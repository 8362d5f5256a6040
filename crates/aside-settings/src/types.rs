//! Settings type definitions.
//!
//! All structs use camelCase serde renaming and per-field defaults so a
//! partial user file deserializes cleanly after the deep merge.

use aside_core::constants::{
    DEFAULT_PERSIST_DEBOUNCE_MS, DEFAULT_PROJECTION_RETRY_DELAY_MS, DEFAULT_SETTLE_DELAY_MS,
    InlineBudget,
};
use serde::{Deserialize, Serialize};

/// Root settings for the aside engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsideSettings {
    /// Settings schema version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Scheduler and persistence timing knobs.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Character budgets for the inline projection region.
    #[serde(default)]
    pub inline: InlineBudget,
}

impl Default for AsideSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            engine: EngineSettings::default(),
            inline: InlineBudget::default(),
        }
    }
}

/// Timing knobs for the scheduler, persistence, and projection layers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Delay before re-reading a newly confirmed assistant turn, in ms.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Trailing-edge debounce window for coalesced persistence, in ms.
    #[serde(default = "default_persist_debounce")]
    pub persist_debounce_ms: u64,

    /// Delay before the single projection-attach retry, in ms.
    #[serde(default = "default_projection_retry_delay")]
    pub projection_retry_delay_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            persist_debounce_ms: default_persist_debounce(),
            projection_retry_delay_ms: default_projection_retry_delay(),
        }
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_settle_delay() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_persist_debounce() -> u64 {
    DEFAULT_PERSIST_DEBOUNCE_MS
}

fn default_projection_retry_delay() -> u64 {
    DEFAULT_PROJECTION_RETRY_DELAY_MS
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
