//! # aside-sanitize
//!
//! Hardens and accessibility-corrects raw generated text before it is stored
//! or projected. Generated content is rendered inside a bounded container the
//! producing task does not own; every construct removed here can escape that
//! container, execute code, or load external resources.
//!
//! The pipeline is pure and idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
//!
//! Stages, in order:
//!
//! 1. Strip an accidental whole-response fenced-code wrapper
//! 2. Structural hardening (script/style/iframe/object/embed/stylesheet-link
//!    removal, `on*` handler stripping, script-URI neutralization,
//!    position/z-index/viewport-unit rewrites)
//! 3. Optional delegation to a trusted host sanitizer — an enhancement, never
//!    a dependency; stage 2 stands alone when it is absent
//! 4. Contrast auto-correction of inline `style` color pairs

#![deny(unsafe_code)]

mod color;
mod contrast;
mod fence;
mod harden;

use std::sync::Arc;

pub use color::{brightness, parse_color};
pub use contrast::correct_contrast;
pub use fence::strip_fence_wrapper;
pub use harden::harden;

/// A trusted sanitization capability provided by the hosting environment.
///
/// Returning `None` means the host declined; the built-in stages still run
/// either way. Host implementations must themselves be idempotent to keep the
/// pipeline idempotent.
pub trait HostSanitizer: Send + Sync {
    /// Sanitize the input, or `None` to fall through to the built-in stages.
    fn sanitize_html(&self, input: &str) -> Option<String>;
}

/// The full sanitization pipeline, optionally delegating to a host pass.
#[derive(Clone, Default)]
pub struct Sanitizer {
    host: Option<Arc<dyn HostSanitizer>>,
}

impl Sanitizer {
    /// Pipeline with built-in stages only.
    #[must_use]
    pub fn new() -> Self {
        Self { host: None }
    }

    /// Pipeline that additionally delegates to a host sanitizer.
    #[must_use]
    pub fn with_host(host: Arc<dyn HostSanitizer>) -> Self {
        Self { host: Some(host) }
    }

    /// Run all stages in order.
    #[must_use]
    pub fn sanitize(&self, raw: &str) -> String {
        let unfenced = fence::strip_fence_wrapper(raw);
        let hardened = harden::harden(&unfenced);
        let delegated = match &self.host {
            // Host output is re-hardened: stage 2 guarantees hold regardless
            // of what the host pass produces.
            Some(host) => match host.sanitize_html(&hardened) {
                Some(out) => harden::harden(&out),
                None => hardened,
            },
            None => hardened,
        };
        contrast::correct_contrast(&delegated)
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("host", &self.host.is_some())
            .finish()
    }
}

/// Run the built-in pipeline without a host pass.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    Sanitizer::new().sanitize(raw)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
