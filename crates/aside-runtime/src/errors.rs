//! Runtime error types.

use thiserror::Error;

use aside_core::ids::TaskId;
use aside_store::StoreError;

use crate::collaborators::{GatewayError, ProjectionError, PromptError};

/// Rejections from the scheduler entrypoints.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// A run is already in flight.
    #[error("a run is already in flight")]
    Busy,

    /// The log has no processable message to target.
    #[error("no target message to run against")]
    NoTarget,

    /// A requested task id is not registered or is disabled.
    #[error("unknown or disabled task '{0}'")]
    UnknownTask(TaskId),
}

/// Top-level runtime error.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Scheduler rejection.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Provider gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Prompt construction failure.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Projection-target failure.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
