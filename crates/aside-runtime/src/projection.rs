//! Result identity and projection management.
//!
//! The stored result is the source of truth; both projections are derived
//! views of it:
//!
//! - **Side-channel**: blocks attached to the host's [`ProjectionTarget`],
//!   fully reconstructible via [`ResultProjector::restore`]
//! - **Inline**: a single delimited region merged into the variant's primary
//!   content by the pure [`render_inline`] function, bounded by character
//!   budgets
//!
//! Attach failures are retried once after a short delay and then skipped; a
//! later restore replays the block from the store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use aside_core::constants::{INLINE_REGION_BEGIN, INLINE_REGION_END, InlineBudget, TRUNCATION_MARKER};
use aside_core::ids::{Position, VariantId};
use aside_core::result::{ResultKey, StoredResult};
use aside_core::task::TaskDefinition;
use aside_store::persist::CoalescingWriter;
use aside_store::{ChatStore, StoreError};

use crate::collaborators::ProjectionTarget;

// ─────────────────────────────────────────────────────────────────────────────
// Pure rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Render primary content with the inline-results region.
///
/// `base` must not already contain a region (strip first). Each result is
/// bounded by the per-task budget and the whole region by the total budget;
/// overflow is cut at a char boundary and marked. No results means no region.
#[must_use]
pub fn render_inline(base: &str, results: &[&StoredResult], budget: InlineBudget) -> String {
    let base = base.trim_end();
    if results.is_empty() {
        return base.to_owned();
    }

    let blocks: Vec<String> = results
        .iter()
        .map(|r| {
            let block = format!("**{}**\n{}", r.task_name, r.content);
            truncate_chars(&block, budget.per_task_chars)
        })
        .collect();
    let region = truncate_chars(&blocks.join("\n\n"), budget.total_chars);

    format!("{base}\n\n{INLINE_REGION_BEGIN}\n{region}\n{INLINE_REGION_END}")
}

/// Remove the inline-results region from primary content.
///
/// Returns the content unchanged (trailing-trimmed) when no region is
/// present. A dangling begin marker without an end marker is stripped to the
/// end of the content.
#[must_use]
pub fn strip_inline_region(content: &str) -> String {
    let Some(begin) = content.find(INLINE_REGION_BEGIN) else {
        return content.trim_end().to_owned();
    };
    let head = content[..begin].trim_end();
    let after_begin = &content[begin + INLINE_REGION_BEGIN.len()..];
    match after_begin.find(INLINE_REGION_END) {
        Some(end) => {
            let tail = &after_begin[end + INLINE_REGION_END.len()..];
            let mut out = head.to_owned();
            if !tail.trim().is_empty() {
                out.push_str("\n\n");
                out.push_str(tail.trim_start());
            }
            out.trim_end().to_owned()
        }
        None => head.to_owned(),
    }
}

/// Cut at a char boundary to fit `max` chars, appending the truncation
/// marker when anything was removed.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max <= marker_len {
        return TRUNCATION_MARKER.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Projector
// ─────────────────────────────────────────────────────────────────────────────

/// Stores results and keeps both projections in sync with them.
pub struct ResultProjector {
    store: Arc<dyn ChatStore>,
    target: Arc<dyn ProjectionTarget>,
    budget: InlineBudget,
    retry_delay: Duration,
    writer: Option<Arc<CoalescingWriter>>,
}

impl ResultProjector {
    /// Build a projector over a store and a projection target.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        target: Arc<dyn ProjectionTarget>,
        budget: InlineBudget,
        retry_delay: Duration,
    ) -> Self {
        Self {
            store,
            target,
            budget,
            retry_delay,
            writer: None,
        }
    }

    /// Mark dirty-store state through this coalescing writer after mutations.
    #[must_use]
    pub fn with_writer(mut self, writer: Arc<CoalescingWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    fn touch(&self) {
        if let Some(writer) = &self.writer {
            writer.touch();
        }
    }

    /// Store sanitized content for one identity and project it.
    ///
    /// Last write wins. The `edited` flag survives an overwrite only when the
    /// incoming content is identical to the edited content already stored; a
    /// fresh generation clears it.
    pub async fn store_result(
        &self,
        key: &ResultKey,
        task: &TaskDefinition,
        content: String,
    ) -> Result<(), StoreError> {
        let previous = self.store.result(key);
        let mut result = StoredResult::generated(
            content,
            task.name.clone(),
            task.format_style,
            task.is_inline(),
        );
        if let Some(prev) = previous {
            result.edited = prev.edited && prev.content == result.content;
        }

        self.store.upsert_result(key, result.clone())?;
        self.touch();

        if result.inline {
            self.refresh_inline(key.position, key.variant)?;
        } else {
            self.attach_with_retry(key, &result).await;
        }
        Ok(())
    }

    /// Delete one stored result and both of its projections.
    ///
    /// Sibling results (other tasks on the same variant) keep their blocks
    /// and inline contributions.
    pub async fn delete_result(&self, key: &ResultKey) -> Result<Option<StoredResult>, StoreError> {
        let removed = self.store.delete_result(key)?;
        if let Some(removed) = &removed {
            self.touch();
            if removed.inline {
                self.refresh_inline(key.position, key.variant)?;
            }
            self.target.detach_result(key).await;
        }
        Ok(removed)
    }

    /// Replay the side-channel blocks for the active variant of a message.
    ///
    /// Pure re-derivation from stored results: duplicate-guarded through
    /// `has_block`, never triggers execution.
    pub async fn restore(&self, position: Position) -> Result<(), StoreError> {
        let msg = self
            .store
            .message(position)
            .ok_or(StoreError::MessageNotFound(position))?;
        let Some(variant) = msg.active() else {
            return Ok(());
        };
        for (task_id, result) in &variant.results {
            if result.inline {
                continue;
            }
            let key = ResultKey::new(position, variant.id, task_id.clone());
            if self.target.has_block(&key).await {
                continue;
            }
            self.attach_with_retry(&key, result).await;
        }
        Ok(())
    }

    /// Recompute the inline region of one variant from its stored results.
    pub fn refresh_inline(&self, position: Position, variant: VariantId) -> Result<(), StoreError> {
        let msg = self
            .store
            .message(position)
            .ok_or(StoreError::MessageNotFound(position))?;
        let slot = msg
            .variant(variant)
            .ok_or(StoreError::VariantNotFound { position, variant })?;

        let base = strip_inline_region(&slot.content);
        let inline_results: Vec<&StoredResult> =
            slot.results.values().filter(|r| r.inline).collect();
        let content = render_inline(&base, &inline_results, self.budget);
        self.store.set_content(position, variant, content)?;
        self.touch();
        Ok(())
    }

    /// Attach a block, retrying once after the configured delay. Total
    /// failure is logged and skipped; the stored result remains restorable.
    pub(crate) async fn attach_with_retry(&self, key: &ResultKey, result: &StoredResult) {
        if let Err(first) = self.target.attach_result(key, result).await {
            debug!(%key, error = %first, "attach failed, retrying once");
            tokio::time::sleep(self.retry_delay).await;
            if let Err(second) = self.target.attach_result(key, result).await {
                warn!(%key, error = %second, "attach failed after retry, skipping");
            }
        }
    }

    /// The projection target this projector writes to.
    #[must_use]
    pub(crate) fn target(&self) -> &Arc<dyn ProjectionTarget> {
        &self.target
    }
}

impl std::fmt::Debug for ResultProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultProjector")
            .field("budget", &self.budget)
            .field("retry_delay", &self.retry_delay)
            .field("writer", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
