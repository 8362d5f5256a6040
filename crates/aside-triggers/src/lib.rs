//! # aside-triggers
//!
//! Trigger evaluation for sidecar tasks: decides, on each user turn, which
//! trigger-mode tasks should be queued for the next assistant turn.
//!
//! - Keyword configs match by case-insensitive substring containment
//! - Regex configs compile each pattern case-insensitively; JS-style
//!   `/body/flags` literals are normalized first, and a pattern that still
//!   fails to compile is logged and skipped — it never aborts the check
//! - OR semantics: any pattern match fires the task

#![deny(unsafe_code)]

mod engine;

pub use engine::{matches, normalize_pattern, scan_user_turn};
