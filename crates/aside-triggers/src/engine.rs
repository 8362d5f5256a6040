//! Trigger config evaluation.

use aside_core::ids::TaskId;
use aside_core::task::{TaskDefinition, TriggerConfig, TriggerKind, TriggerMode};
use regex::RegexBuilder;
use tracing::warn;

/// Evaluate a trigger config against one user turn.
///
/// OR semantics over the ordered pattern list. A malformed regex pattern is
/// skipped (warn-logged) without aborting the remaining patterns.
#[must_use]
pub fn matches(text: &str, config: &TriggerConfig) -> bool {
    match config.kind {
        TriggerKind::Keyword => {
            let haystack = text.to_lowercase();
            config
                .patterns
                .iter()
                .any(|p| !p.is_empty() && haystack.contains(&p.to_lowercase()))
        }
        TriggerKind::Regex => config.patterns.iter().any(|pattern| {
            let normalized = normalize_pattern(pattern);
            match RegexBuilder::new(&normalized).case_insensitive(true).build() {
                Ok(re) => re.is_match(text),
                Err(err) => {
                    warn!(pattern, %err, "skipping malformed trigger pattern");
                    false
                }
            }
        }),
    }
}

/// Normalize a pattern that may be a JS-style regex literal.
///
/// `/body/flags` becomes `body` with the flag annotation stripped; matching
/// is case-insensitive regardless of the stripped flags. Anything else is
/// returned unchanged.
#[must_use]
pub fn normalize_pattern(pattern: &str) -> String {
    if pattern.len() >= 2 && pattern.starts_with('/') {
        if let Some(close) = pattern.rfind('/') {
            if close > 0 {
                let flags = &pattern[close + 1..];
                if flags.chars().all(|c| matches!(c, 'i' | 'g' | 'm' | 's' | 'u' | 'y')) {
                    return pattern[1..close].to_owned();
                }
            }
        }
    }
    pattern.to_owned()
}

/// Scan one user turn against every enabled trigger-mode task.
///
/// Returns the ids to add to the queued-trigger set; execution is deferred
/// until the next assistant turn.
#[must_use]
pub fn scan_user_turn(tasks: &[TaskDefinition], text: &str) -> Vec<TaskId> {
    tasks
        .iter()
        .filter(|t| t.enabled && t.trigger_mode == TriggerMode::Trigger)
        .filter(|t| {
            t.trigger_config
                .as_ref()
                .is_some_and(|config| matches(text, config))
        })
        .map(|t| t.id.clone())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
