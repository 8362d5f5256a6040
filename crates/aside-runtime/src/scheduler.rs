//! Run scheduling and dedup guarding.
//!
//! The [`Orchestrator`] is the single-flight state machine in front of the
//! execution coordinator:
//!
//! - **Idle/Busy**: one active run per session; events arriving while busy
//!   overwrite a single pending slot (coalesce-to-latest, not a queue)
//! - **Dedup**: a run commits its (position, variant, fingerprint) triple on
//!   success; an equal triple is a no-op until the fingerprint changes
//! - **Triggers**: user turns queue matching trigger-mode tasks; the
//!   assistant-turn handler re-checks exactly the immediately preceding user
//!   turn as a fallback, and only consumed (successful) ids are dequeued
//! - **Re-dispatch**: a pending event is dispatched on a fresh task after
//!   the run settles, never on the same call stack

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{Instrument, debug, info_span};

use aside_core::ids::{Fingerprint, Position, RunId, TaskId, VariantId};
use aside_core::message::Role;
use aside_core::result::{ResultKey, StoredResult};
use aside_core::run::{CommittedRun, EventPayload, RunState};
use aside_core::task::{TaskDefinition, TriggerMode};
use aside_sanitize::Sanitizer;
use aside_settings::AsideSettings;
use aside_store::persist::CoalescingWriter;
use aside_store::{ChatStore, StoreError};
use aside_triggers::scan_user_turn;

use crate::collaborators::{PromptBuilder, PromptContext, ProjectionTarget, ProviderGateway};
use crate::coordinator::{ExecutionCoordinator, RunReport};
use crate::errors::SchedulerError;
use crate::projection::ResultProjector;
use crate::registry::TaskRegistry;
use crate::resolver;

/// Host-supplied collaborators wired into the orchestrator.
pub struct EngineDeps {
    /// The conversation log.
    pub store: Arc<dyn ChatStore>,
    /// Outbound provider client.
    pub gateway: Arc<dyn ProviderGateway>,
    /// Prompt/context templating.
    pub prompts: Arc<dyn PromptBuilder>,
    /// UI-side projection region.
    pub target: Arc<dyn ProjectionTarget>,
    /// Sanitization pipeline, optionally host-delegating.
    pub sanitizer: Sanitizer,
    /// Coalesced persistence, when the host wants durability.
    pub writer: Option<Arc<CoalescingWriter>>,
}

impl EngineDeps {
    /// Wire the required collaborators; built-in sanitizer, no persistence.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        gateway: Arc<dyn ProviderGateway>,
        prompts: Arc<dyn PromptBuilder>,
        target: Arc<dyn ProjectionTarget>,
    ) -> Self {
        Self {
            store,
            gateway,
            prompts,
            target,
            sanitizer: Sanitizer::new(),
            writer: None,
        }
    }
}

/// Caller-initiated re-run of one task against one message identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryRequest {
    /// Task to re-run.
    pub task: TaskId,
    /// Target position.
    pub position: Position,
    /// Target variant.
    pub variant: VariantId,
}

/// Single-flight scheduler over the execution coordinator.
pub struct Orchestrator {
    store: Arc<dyn ChatStore>,
    registry: Arc<TaskRegistry>,
    coordinator: ExecutionCoordinator,
    projector: Arc<ResultProjector>,
    state: Mutex<RunState>,
    settle_delay: Duration,
}

impl Orchestrator {
    /// Build the orchestrator from collaborators, a task registry, and
    /// settings.
    #[must_use]
    pub fn new(deps: EngineDeps, registry: Arc<TaskRegistry>, settings: &AsideSettings) -> Arc<Self> {
        let mut projector = ResultProjector::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.target),
            settings.inline,
            Duration::from_millis(settings.engine.projection_retry_delay_ms),
        );
        if let Some(writer) = deps.writer {
            projector = projector.with_writer(writer);
        }
        let projector = Arc::new(projector);
        let coordinator = ExecutionCoordinator::new(
            deps.gateway,
            deps.prompts,
            Arc::clone(&projector),
            deps.sanitizer,
        );
        Arc::new(Self {
            store: deps.store,
            registry,
            coordinator,
            projector,
            state: Mutex::new(RunState::new()),
            settle_delay: Duration::from_millis(settings.engine.settle_delay_ms),
        })
    }

    // ── Event entrypoints ───────────────────────────────────────────

    /// Scan one user turn and queue matching trigger-mode tasks.
    ///
    /// Execution is deferred to the next assistant turn. Returns the ids
    /// queued by this call.
    pub fn notify_user_turn(&self, text: &str) -> Vec<TaskId> {
        let matched = scan_user_turn(&self.registry.enabled(), text);
        if !matched.is_empty() {
            let mut state = self.state.lock();
            for id in &matched {
                let _ = state.queued_triggers.insert(id.clone());
            }
            debug!(queued = matched.len(), "queued trigger tasks");
        }
        matched
    }

    /// Fire-and-forget notification of a confirmed assistant turn.
    pub fn notify_assistant_turn(self: &Arc<Self>, payload: EventPayload) {
        drop(tokio::spawn(Arc::clone(self).dispatch(payload)));
    }

    /// Dispatch one event through the state machine.
    ///
    /// Resolves when the whole cycle settles (including a no-op skip). If a
    /// run is already in flight the event lands in the pending slot and this
    /// resolves immediately; the slot holder re-dispatches it later.
    pub fn dispatch(self: Arc<Self>, payload: EventPayload) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            {
                let mut state = self.state.lock();
                if state.busy {
                    debug!("busy, coalescing event into pending slot");
                    state.pending = Some(payload);
                    return;
                }
                state.busy = true;
            }

            // Let the host finish writing the turn before reading it.
            if !self.settle_delay.is_zero() {
                tokio::time::sleep(self.settle_delay).await;
            }

            if let Some(report) = self.run_cycle(&payload).await {
                debug!(
                    run_id = %report.run_id,
                    outcomes = report.outcomes.len(),
                    duration_ms = report.duration_ms,
                    "run settled"
                );
            }
            self.finish_run();
        })
    }

    /// Run manual-mode tasks against the most recent message.
    ///
    /// An empty id set means every enabled manual-mode task. Rejects with
    /// [`SchedulerError::Busy`] while a run is in flight; otherwise resolves
    /// when the whole run settles. Does not touch the dedup triple.
    pub async fn run_manual(self: &Arc<Self>, ids: &[TaskId]) -> Result<RunReport, SchedulerError> {
        self.acquire_busy()?;
        let result = self.run_manual_inner(ids).await;
        self.finish_run();
        result
    }

    /// Re-run one task against one message identity, overwriting its result.
    ///
    /// Takes the same busy gate as every other run; does not touch the dedup
    /// triple.
    pub async fn retry(self: &Arc<Self>, request: RetryRequest) -> Result<RunReport, SchedulerError> {
        self.acquire_busy()?;
        let result = self.retry_inner(request).await;
        self.finish_run();
        result
    }

    // ── Projection passthrough ──────────────────────────────────────

    /// Replay side-channel blocks for a message's active variant. Never
    /// triggers execution.
    pub async fn restore(&self, position: Position) -> Result<(), StoreError> {
        self.projector.restore(position).await
    }

    /// Delete one stored result and both of its projections.
    pub async fn delete_result(
        &self,
        key: &ResultKey,
    ) -> Result<Option<StoredResult>, StoreError> {
        self.projector.delete_result(key).await
    }

    // ── Introspection ───────────────────────────────────────────────

    /// Whether a run is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Snapshot of the queued trigger ids.
    #[must_use]
    pub fn queued_triggers(&self) -> BTreeSet<TaskId> {
        self.state.lock().queued_triggers.clone()
    }

    /// The last committed dedup triple.
    #[must_use]
    pub fn last_committed(&self) -> Option<CommittedRun> {
        self.state.lock().last_committed.clone()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn acquire_busy(&self) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.busy {
            return Err(SchedulerError::Busy);
        }
        state.busy = true;
        Ok(())
    }

    /// Clear the busy flag and re-dispatch a pending event on a fresh task.
    fn finish_run(self: &Arc<Self>) {
        let pending = {
            let mut state = self.state.lock();
            state.busy = false;
            state.pending.take()
        };
        if let Some(next) = pending {
            debug!("re-dispatching pending event");
            drop(tokio::spawn(Arc::clone(self).dispatch(next)));
        }
    }

    /// One scheduler cycle: resolve, dedup-check, execute, commit.
    ///
    /// `None` means the cycle was skipped without running anything.
    async fn run_cycle(&self, payload: &EventPayload) -> Option<RunReport> {
        let resolved = resolver::resolve(payload, self.store.as_ref());
        let Some(position) = resolved.position.or_else(|| self.store.last_position()) else {
            debug!("nothing to resolve against, skipping");
            return None;
        };
        if position.is_seed() {
            debug!("seed position, skipping");
            return None;
        }
        let message = resolved.message.or_else(|| self.store.message(position))?;
        if message.role != Role::Assistant {
            debug!(%position, "not an assistant turn, skipping");
            return None;
        }
        let variant = message.active()?;
        let triple = CommittedRun {
            position,
            variant: variant.id,
            fingerprint: Fingerprint::derive(position, variant.id, variant.generation),
        };

        {
            let state = self.state.lock();
            if state.is_duplicate(&triple) {
                debug!(%position, variant = %triple.variant, "duplicate triple, skipping");
                return None;
            }
        }

        let tasks = self.collect_run_set(position);
        let run_id = RunId::new();
        let span = info_span!("run", %run_id, %position, variant = %triple.variant);
        let context = self.context_for(position, triple.variant);
        let mut report = self
            .coordinator
            .execute(run_id, tasks, position, triple.variant, &context)
            .instrument(span)
            .await;

        let succeeded = report.succeeded_ids();
        {
            let mut state = self.state.lock();
            // A run where every task failed commits nothing, so the same
            // turn can run again on the next notification.
            if !report.all_failed() {
                state.last_committed = Some(triple);
            }
            let consumed: Vec<TaskId> = succeeded
                .into_iter()
                .filter(|id| state.queued_triggers.remove(id))
                .collect();
            report.consumed_triggers = consumed;
        }
        Some(report)
    }

    /// Enabled auto tasks plus trigger tasks that are queued or match the
    /// immediately preceding user turn (one position back, never further).
    fn collect_run_set(&self, position: Position) -> Vec<TaskDefinition> {
        let enabled = self.registry.enabled();
        let mut trigger_ids: BTreeSet<TaskId> = self.state.lock().queued_triggers.clone();

        if let Some(prev) = position.prev() {
            if let Some(prev_msg) = self.store.message(prev) {
                if prev_msg.role == Role::User {
                    if let Some(v) = prev_msg.active() {
                        for id in scan_user_turn(&enabled, &v.content) {
                            let _ = trigger_ids.insert(id);
                        }
                    }
                }
            }
        }

        enabled
            .into_iter()
            .filter(|t| match t.trigger_mode {
                TriggerMode::Auto => true,
                TriggerMode::Trigger => trigger_ids.contains(&t.id),
                TriggerMode::Manual => false,
            })
            .collect()
    }

    async fn run_manual_inner(&self, ids: &[TaskId]) -> Result<RunReport, SchedulerError> {
        let tasks = if ids.is_empty() {
            self.registry.enabled_manual()
        } else {
            let mut tasks = Vec::with_capacity(ids.len());
            for id in ids {
                match self.registry.by_id(id) {
                    Some(task) if task.enabled => tasks.push(task),
                    _ => return Err(SchedulerError::UnknownTask(id.clone())),
                }
            }
            tasks
        };

        let (position, variant) = self.latest_target()?;
        let run_id = RunId::new();
        let span = info_span!("manual_run", %run_id, %position);
        let context = self.context_for(position, variant);
        Ok(self
            .coordinator
            .execute(run_id, tasks, position, variant, &context)
            .instrument(span)
            .await)
    }

    async fn retry_inner(&self, request: RetryRequest) -> Result<RunReport, SchedulerError> {
        if request.position.is_seed() {
            return Err(SchedulerError::NoTarget);
        }
        let task = self
            .registry
            .by_id(&request.task)
            .filter(|t| t.enabled)
            .ok_or_else(|| SchedulerError::UnknownTask(request.task.clone()))?;
        let message = self
            .store
            .message(request.position)
            .ok_or(SchedulerError::NoTarget)?;
        if message.variant(request.variant).is_none() {
            return Err(SchedulerError::NoTarget);
        }

        let run_id = RunId::new();
        let span = info_span!("retry_run", %run_id, position = %request.position, task = %request.task);
        let context = self.context_for(request.position, request.variant);
        Ok(self
            .coordinator
            .execute(run_id, vec![task], request.position, request.variant, &context)
            .instrument(span)
            .await)
    }

    /// Most recent processable message, as a (position, active variant) pair.
    fn latest_target(&self) -> Result<(Position, VariantId), SchedulerError> {
        let position = self.store.last_position().ok_or(SchedulerError::NoTarget)?;
        if position.is_seed() {
            return Err(SchedulerError::NoTarget);
        }
        let message = self.store.message(position).ok_or(SchedulerError::NoTarget)?;
        let variant = message.active().ok_or(SchedulerError::NoTarget)?;
        Ok((position, variant.id))
    }

    /// Log snapshot up to and including the target message.
    fn context_for(&self, position: Position, variant: VariantId) -> PromptContext {
        let mut messages = Vec::with_capacity(position.index() + 1);
        for index in 0..=position.index() {
            if let Some(message) = self.store.message(Position::new(index)) {
                messages.push(message);
            }
        }
        PromptContext {
            messages,
            position,
            variant,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settle_delay", &self.settle_delay)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}
