//! Host-provided collaborator traits.
//!
//! The engine is embedded: the hosting application supplies the provider
//! client, the prompt/context templating, and the visual rendering layer.
//! These traits are the seams. All are object-safe and async so hosts can
//! back them with network calls or UI bridges.

use async_trait::async_trait;
use thiserror::Error;

use aside_core::errors::{ErrorCategory, TaskFailure};
use aside_core::ids::{Position, VariantId};
use aside_core::message::ChatMessage;
use aside_core::result::{ResultKey, StoredResult};
use aside_core::task::TaskDefinition;

// ─────────────────────────────────────────────────────────────────────────────
// Provider gateway
// ─────────────────────────────────────────────────────────────────────────────

/// Failures raised by the provider gateway.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Credential problem (expired token, invalid key).
    #[error("auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Suggested retry delay in milliseconds, when the provider says.
        retry_after_ms: Option<u64>,
        /// Error description.
        message: String,
    },

    /// Transport-level failure (timeout, connect, DNS).
    #[error("network error: {message}")]
    Network {
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether the provider marked this retryable.
        retryable: bool,
    },

    /// Request rejected as invalid before or by the provider.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Error description.
        message: String,
    },

    /// Anything unclassified.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl GatewayError {
    /// Whether this error is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Auth { .. } | Self::InvalidRequest { .. } | Self::Other { .. } => false,
        }
    }

    /// Coarse classification for logging and failure records.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth { .. } => ErrorCategory::Auth,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Api { status, .. } if *status >= 500 => ErrorCategory::Server,
            Self::Api { .. } => ErrorCategory::InvalidRequest,
            Self::InvalidRequest { .. } => ErrorCategory::InvalidRequest,
            Self::Other { .. } => ErrorCategory::Unknown,
        }
    }
}

/// Outbound AI provider client, supplied by the host.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// One standalone call for one task.
    async fn send(&self, task: &TaskDefinition, prompt: &str) -> Result<String, GatewayError>;

    /// One combined call for a batch group. Must return exactly one response
    /// text per task, in order.
    async fn send_batch(
        &self,
        tasks: &[TaskDefinition],
        prompts: &[String],
    ) -> Result<Vec<String>, GatewayError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompt builder
// ─────────────────────────────────────────────────────────────────────────────

/// Prompt construction failed for one task.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("prompt build failed: {message}")]
pub struct PromptError {
    /// Error description.
    pub message: String,
}

impl PromptError {
    /// Build an error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Snapshot handed to the prompt builder for one run.
#[derive(Clone, Debug)]
pub struct PromptContext {
    /// Log snapshot up to and including the target message.
    pub messages: Vec<ChatMessage>,
    /// Target message position.
    pub position: Position,
    /// Target variant.
    pub variant: VariantId,
}

/// Prompt/context templating, supplied by the host.
pub trait PromptBuilder: Send + Sync {
    /// Build the outbound prompt for one task against one log snapshot.
    fn build(
        &self,
        task: &TaskDefinition,
        context: &PromptContext,
    ) -> Result<String, PromptError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Projection target
// ─────────────────────────────────────────────────────────────────────────────

/// A UI-side block operation failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("projection failed at {key}: {message}")]
pub struct ProjectionError {
    /// Identity the failure is scoped to.
    pub key: ResultKey,
    /// Error description.
    pub message: String,
}

impl ProjectionError {
    /// Build an error for one identity.
    #[must_use]
    pub fn new(key: ResultKey, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

/// The visual side-channel region, supplied by the host.
///
/// Blocks are addressed by [`ResultKey`]; the target renders them however it
/// likes. Attach failures are retried once by the projection manager and then
/// skipped — the stored result remains the source of truth and a later
/// restore replays it.
#[async_trait]
pub trait ProjectionTarget: Send + Sync {
    /// Show or clear a loading indicator for one identity.
    async fn set_loading(&self, key: &ResultKey, loading: bool);

    /// Whether a block for this identity is already displayed.
    async fn has_block(&self, key: &ResultKey) -> bool;

    /// Attach or update the result block for one identity.
    async fn attach_result(
        &self,
        key: &ResultKey,
        result: &StoredResult,
    ) -> Result<(), ProjectionError>;

    /// Remove the block for one identity, if displayed.
    async fn detach_result(&self, key: &ResultKey);

    /// Surface a failure block for one identity.
    async fn attach_error(&self, key: &ResultKey, failure: &TaskFailure);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use aside_core::ids::TaskId;

    #[test]
    fn gateway_retryability() {
        assert!(
            GatewayError::RateLimited {
                retry_after_ms: Some(1000),
                message: "slow down".into()
            }
            .is_retryable()
        );
        assert!(
            GatewayError::Network {
                message: "timeout".into()
            }
            .is_retryable()
        );
        assert!(
            !GatewayError::Auth {
                message: "expired".into()
            }
            .is_retryable()
        );
        assert!(
            GatewayError::Api {
                status: 503,
                message: "overloaded".into(),
                retryable: true
            }
            .is_retryable()
        );
        assert!(
            !GatewayError::Api {
                status: 400,
                message: "bad".into(),
                retryable: false
            }
            .is_retryable()
        );
    }

    #[test]
    fn gateway_categories() {
        let server = GatewayError::Api {
            status: 500,
            message: "ise".into(),
            retryable: true,
        };
        assert_eq!(server.category(), ErrorCategory::Server);
        let client = GatewayError::Api {
            status: 422,
            message: "unprocessable".into(),
            retryable: false,
        };
        assert_eq!(client.category(), ErrorCategory::InvalidRequest);
        assert_eq!(
            GatewayError::Other { message: "?".into() }.category(),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn projection_error_display_names_identity() {
        use aside_core::ids::{Position, VariantId};
        let key = ResultKey::new(Position::new(2), VariantId::new(0), TaskId::from("taskX"));
        let err = ProjectionError::new(key, "ui detached");
        assert!(err.to_string().contains("2/0/taskX"));
    }
}
