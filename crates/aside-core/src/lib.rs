//! # aside-core
//!
//! Foundation types for the aside sidecar-task engine.
//!
//! This crate provides the shared vocabulary the other aside crates depend on:
//!
//! - **Branded IDs**: `TaskId`, `MessageId`, `RunId`, plus the numeric
//!   `Position` and `VariantId` newtypes and the `Fingerprint` derivation
//! - **Chat model**: `ChatMessage` with variants and generation markers
//! - **Task model**: `TaskDefinition` with trigger/request/response modes
//! - **Results**: `StoredResult` keyed by `ResultKey`
//! - **Run state**: `RunState` — busy flag, pending slot, queued triggers,
//!   last committed triple
//! - **Errors**: `TaskFailure` and `ErrorCategory` classification
//! - **Logging**: `init_subscriber` for the tracing stack

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod message;
pub mod result;
pub mod run;
pub mod task;
