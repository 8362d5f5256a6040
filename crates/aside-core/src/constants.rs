//! Engine-wide constants and default tunables.

use serde::{Deserialize, Serialize};

/// Delimiter opening the injected inline-results region.
pub const INLINE_REGION_BEGIN: &str = "<!--aside:results-->";

/// Delimiter closing the injected inline-results region.
pub const INLINE_REGION_END: &str = "<!--/aside:results-->";

/// Marker appended where content was cut to fit a budget.
pub const TRUNCATION_MARKER: &str = " …[truncated]";

/// Default settle delay before re-reading a newly confirmed assistant turn.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 250;

/// Default trailing-edge debounce window for coalesced persistence.
pub const DEFAULT_PERSIST_DEBOUNCE_MS: u64 = 1000;

/// Default delay before the single projection-attach retry.
pub const DEFAULT_PROJECTION_RETRY_DELAY_MS: u64 = 500;

/// Default total character budget of the inline region.
pub const DEFAULT_INLINE_TOTAL_BUDGET: usize = 8000;

/// Default per-task character budget inside the inline region.
pub const DEFAULT_INLINE_PER_TASK_BUDGET: usize = 2000;

/// Character budgets bounding the inline projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineBudget {
    /// Budget for the whole region.
    #[serde(default = "default_total")]
    pub total_chars: usize,
    /// Budget for each task's contribution.
    #[serde(default = "default_per_task")]
    pub per_task_chars: usize,
}

fn default_total() -> usize {
    DEFAULT_INLINE_TOTAL_BUDGET
}

fn default_per_task() -> usize {
    DEFAULT_INLINE_PER_TASK_BUDGET
}

impl Default for InlineBudget {
    fn default() -> Self {
        Self {
            total_chars: DEFAULT_INLINE_TOTAL_BUDGET,
            per_task_chars: DEFAULT_INLINE_PER_TASK_BUDGET,
        }
    }
}
