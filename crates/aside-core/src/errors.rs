//! Shared error classification.
//!
//! Domain-specific error enums live next to the traits that raise them
//! (gateway, store, projection). This module holds the vocabulary they share:
//! [`ErrorCategory`] for classification and [`TaskFailure`], the localized,
//! retryable failure value surfaced for a single task + message identity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::TaskId;
use crate::result::ResultKey;

/// Coarse classification of a failure, used for logging and retry decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credential problem.
    Auth,
    /// Provider rate limit.
    RateLimit,
    /// Transport-level failure.
    Network,
    /// Provider-side server error.
    Server,
    /// Request rejected as invalid.
    InvalidRequest,
    /// Local storage failure.
    Storage,
    /// Anything unclassified.
    Unknown,
}

impl ErrorCategory {
    /// Whether failures of this category are worth retrying.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Server)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::Server => "server",
            Self::InvalidRequest => "invalid_request",
            Self::Storage => "storage",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Failure of one task against one message identity.
///
/// This is the only failure shape that ever reaches the host UI: scoped to a
/// single [`ResultKey`], independently retryable, never affecting siblings.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("task {task} failed at {key}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct TaskFailure {
    /// The failing task.
    pub task: TaskId,
    /// Identity the failure is scoped to.
    pub key: ResultKey,
    /// Human-readable message.
    pub message: String,
    /// Classification.
    pub category: ErrorCategory,
    /// Whether a caller-initiated retry is sensible.
    pub retryable: bool,
}

impl TaskFailure {
    /// Build a failure for one task + identity.
    #[must_use]
    pub fn new(key: ResultKey, message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            task: key.task.clone(),
            key,
            message: message.into(),
            category,
            retryable: category.is_retryable(),
        }
    }

    /// Override the retryable flag.
    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
