//! # aside-runtime
//!
//! The orchestration core of the aside sidecar-task engine.
//!
//! Events describing confirmed chat turns flow in; sanitized, identity-keyed
//! results flow out to the chat store and the host's projection surface:
//!
//! - [`resolver`] — maps heterogeneous event payloads to log coordinates
//! - [`scheduler`] — the Idle/Busy single-flight machine with dedup triples,
//!   pending-slot coalescing, and trigger queuing
//! - [`coordinator`] — concurrent batch/standalone execution with per-task
//!   failure isolation
//! - [`projection`] — stored-result identity plus the inline and
//!   side-channel projections
//! - [`collaborators`] — the traits the hosting application implements
//!   (provider gateway, prompt builder, projection target)

#![deny(unsafe_code)]

pub mod collaborators;
pub mod coordinator;
pub mod errors;
pub mod projection;
pub mod registry;
pub mod resolver;
pub mod scheduler;

pub use collaborators::{
    GatewayError, ProjectionError, ProjectionTarget, PromptBuilder, PromptContext, PromptError,
    ProviderGateway,
};
pub use coordinator::{RunReport, TaskOutcome};
pub use errors::{RuntimeError, SchedulerError};
pub use projection::{ResultProjector, render_inline, strip_inline_region};
pub use registry::TaskRegistry;
pub use resolver::{ResolvedEvent, resolve};
pub use scheduler::{EngineDeps, Orchestrator, RetryRequest};
