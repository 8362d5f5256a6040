//! Concurrent run execution.
//!
//! A run-set is partitioned into batch groups (tasks sharing a batch key go
//! out as one combined call) and standalone tasks (one call each). All groups
//! execute concurrently and are joined with collect-each-outcome semantics:
//! one task's failure never cancels siblings, and every failure is scoped to
//! its own (position, variant, task) identity.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, warn};

use aside_core::errors::{ErrorCategory, TaskFailure};
use aside_core::ids::{Position, RunId, TaskId, VariantId};
use aside_core::result::ResultKey;
use aside_core::task::TaskDefinition;
use aside_sanitize::Sanitizer;

use crate::collaborators::{GatewayError, PromptBuilder, PromptContext, ProviderGateway};
use crate::projection::ResultProjector;

/// Outcome of one task within a run.
#[derive(Clone, Debug)]
pub struct TaskOutcome {
    /// The task that ran.
    pub task: TaskId,
    /// Success, or the scoped failure.
    pub result: Result<(), TaskFailure>,
}

impl TaskOutcome {
    /// Whether this task succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// What one scheduler cycle did, for host introspection.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Run identifier carried through the tracing spans.
    pub run_id: RunId,
    /// Target message position.
    pub position: Position,
    /// Target variant.
    pub variant: VariantId,
    /// Per-task outcomes, one per task in the run-set.
    pub outcomes: Vec<TaskOutcome>,
    /// Queued trigger ids consumed by this run.
    pub consumed_triggers: Vec<TaskId>,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

impl RunReport {
    /// Ids of the tasks that succeeded.
    #[must_use]
    pub fn succeeded_ids(&self) -> Vec<TaskId> {
        self.outcomes
            .iter()
            .filter(|o| o.succeeded())
            .map(|o| o.task.clone())
            .collect()
    }

    /// Whether the run had tasks and every one of them failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| !o.succeeded())
    }
}

/// Split a run-set into batch groups (by key) and standalone tasks.
///
/// Group order is deterministic: batch groups by key, then standalone tasks
/// in run-set order.
#[must_use]
pub fn partition(
    tasks: Vec<TaskDefinition>,
) -> (BTreeMap<String, Vec<TaskDefinition>>, Vec<TaskDefinition>) {
    let mut batches: BTreeMap<String, Vec<TaskDefinition>> = BTreeMap::new();
    let mut standalone = Vec::new();
    for task in tasks {
        match task.batch_key() {
            Some(key) => batches.entry(key.to_owned()).or_default().push(task),
            None => standalone.push(task),
        }
    }
    (batches, standalone)
}

/// Executes run-sets against the provider gateway.
pub struct ExecutionCoordinator {
    gateway: Arc<dyn ProviderGateway>,
    prompts: Arc<dyn PromptBuilder>,
    projector: Arc<ResultProjector>,
    sanitizer: Sanitizer,
}

impl ExecutionCoordinator {
    /// Build a coordinator.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        prompts: Arc<dyn PromptBuilder>,
        projector: Arc<ResultProjector>,
        sanitizer: Sanitizer,
    ) -> Self {
        Self {
            gateway,
            prompts,
            projector,
            sanitizer,
        }
    }

    /// Execute a run-set concurrently and collect every outcome.
    pub async fn execute(
        &self,
        run_id: RunId,
        tasks: Vec<TaskDefinition>,
        position: Position,
        variant: VariantId,
        context: &PromptContext,
    ) -> RunReport {
        let started = Instant::now();
        let (batches, standalone) = partition(tasks);

        let mut groups: Vec<BoxFuture<'_, Vec<TaskOutcome>>> = Vec::new();
        for (key, group) in batches {
            debug!(%run_id, batch_key = %key, tasks = group.len(), "batch group");
            groups.push(self.run_batch(group, position, variant, context).boxed());
        }
        for task in standalone {
            groups.push(self.run_standalone(task, position, variant, context).boxed());
        }

        let outcomes: Vec<TaskOutcome> = join_all(groups).await.into_iter().flatten().collect();

        let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
        if failed > 0 {
            warn!(%run_id, total = outcomes.len(), failed, "run finished with failures");
        }

        RunReport {
            run_id,
            position,
            variant,
            outcomes,
            consumed_triggers: Vec::new(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    async fn run_batch(
        &self,
        group: Vec<TaskDefinition>,
        position: Position,
        variant: VariantId,
        context: &PromptContext,
    ) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::new();
        let mut ready: Vec<(TaskDefinition, ResultKey, String)> = Vec::new();
        for task in group {
            let key = ResultKey::new(position, variant, task.id.clone());
            match self.prompts.build(&task, context) {
                Ok(prompt) => ready.push((task, key, prompt)),
                Err(err) => {
                    outcomes.push(
                        self.fail(
                            &key,
                            TaskFailure::new(
                                key.clone(),
                                err.to_string(),
                                ErrorCategory::InvalidRequest,
                            ),
                            false,
                        )
                        .await,
                    );
                }
            }
        }
        if ready.is_empty() {
            return outcomes;
        }

        for (_, key, _) in &ready {
            self.projector.target().set_loading(key, true).await;
        }
        let tasks: Vec<TaskDefinition> = ready.iter().map(|(t, _, _)| t.clone()).collect();
        let prompts: Vec<String> = ready.iter().map(|(_, _, p)| p.clone()).collect();

        match self.gateway.send_batch(&tasks, &prompts).await {
            Ok(texts) if texts.len() == ready.len() => {
                for ((task, key, _), text) in ready.into_iter().zip(texts) {
                    outcomes.push(self.finish(&task, &key, &text).await);
                }
            }
            Ok(texts) => {
                let message = format!(
                    "batch returned {} responses for {} tasks",
                    texts.len(),
                    ready.len()
                );
                for (_, key, _) in ready {
                    let failure =
                        TaskFailure::new(key.clone(), message.clone(), ErrorCategory::Unknown);
                    outcomes.push(self.fail(&key, failure, true).await);
                }
            }
            Err(err) => {
                for (_, key, _) in ready {
                    outcomes.push(self.fail_gateway(&key, &err).await);
                }
            }
        }
        outcomes
    }

    async fn run_standalone(
        &self,
        task: TaskDefinition,
        position: Position,
        variant: VariantId,
        context: &PromptContext,
    ) -> Vec<TaskOutcome> {
        let key = ResultKey::new(position, variant, task.id.clone());
        let prompt = match self.prompts.build(&task, context) {
            Ok(prompt) => prompt,
            Err(err) => {
                let failure =
                    TaskFailure::new(key.clone(), err.to_string(), ErrorCategory::InvalidRequest);
                return vec![self.fail(&key, failure, false).await];
            }
        };

        self.projector.target().set_loading(&key, true).await;
        match self.gateway.send(&task, &prompt).await {
            Ok(text) => vec![self.finish(&task, &key, &text).await],
            Err(err) => vec![self.fail_gateway(&key, &err).await],
        }
    }

    /// Sanitize, store, and project one successful response.
    async fn finish(&self, task: &TaskDefinition, key: &ResultKey, raw: &str) -> TaskOutcome {
        let safe = self.sanitizer.sanitize(raw);
        let stored = self.projector.store_result(key, task, safe).await;
        self.projector.target().set_loading(key, false).await;
        match stored {
            Ok(()) => TaskOutcome {
                task: key.task.clone(),
                result: Ok(()),
            },
            Err(err) => {
                let failure = TaskFailure::new(key.clone(), err.to_string(), ErrorCategory::Storage);
                self.projector.target().attach_error(key, &failure).await;
                TaskOutcome {
                    task: key.task.clone(),
                    result: Err(failure),
                }
            }
        }
    }

    async fn fail_gateway(&self, key: &ResultKey, err: &GatewayError) -> TaskOutcome {
        let failure = TaskFailure::new(key.clone(), err.to_string(), err.category())
            .with_retryable(err.is_retryable());
        self.fail(key, failure, true).await
    }

    /// Clear loading, surface the failure block, and record the outcome.
    async fn fail(&self, key: &ResultKey, failure: TaskFailure, clear_loading: bool) -> TaskOutcome {
        if clear_loading {
            self.projector.target().set_loading(key, false).await;
        }
        self.projector.target().attach_error(key, &failure).await;
        debug!(%key, category = %failure.category, retryable = failure.retryable, "task failed");
        TaskOutcome {
            task: key.task.clone(),
            result: Err(failure),
        }
    }
}

impl std::fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCoordinator").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
