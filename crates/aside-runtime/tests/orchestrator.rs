//! End-to-end orchestrator behavior against fake collaborators.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;

use aside_core::constants::INLINE_REGION_BEGIN;
use aside_core::errors::TaskFailure;
use aside_core::ids::{Position, TaskId, VariantId};
use aside_core::message::Role;
use aside_core::result::{ResultKey, StoredResult};
use aside_core::run::EventPayload;
use aside_core::task::{
    FormatStyle, ModelConfig, RequestMode, ResponseLocation, TaskDefinition, TriggerConfig,
    TriggerMode,
};
use aside_runtime::collaborators::{
    GatewayError, ProjectionError, ProjectionTarget, PromptBuilder, PromptContext, PromptError,
    ProviderGateway,
};
use aside_runtime::registry::TaskRegistry;
use aside_runtime::scheduler::{EngineDeps, Orchestrator, RetryRequest};
use aside_runtime::SchedulerError;
use aside_settings::AsideSettings;
use aside_store::memory::MemoryChatStore;
use aside_store::persist::{CoalescingWriter, PersistChannel, PersistError};
use aside_store::ChatStore;

// ─────────────────────────────────────────────────────────────────────────────
// Fakes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeGateway {
    delay: Option<Duration>,
    send_calls: Mutex<Vec<TaskId>>,
    batch_calls: Mutex<Vec<Vec<TaskId>>>,
    responses: Mutex<BTreeMap<TaskId, String>>,
    failing: Mutex<BTreeSet<TaskId>>,
}

impl FakeGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    fn set_response(&self, id: &str, text: &str) {
        let _ = self
            .responses
            .lock()
            .insert(TaskId::from(id), text.to_owned());
    }

    fn set_failing(&self, id: &str) {
        let _ = self.failing.lock().insert(TaskId::from(id));
    }

    fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    fn total_calls(&self) -> usize {
        self.send_calls.lock().len() + self.batch_calls.lock().len()
    }

    fn reply_for(&self, id: &TaskId) -> String {
        self.responses
            .lock()
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("reply for {id}"))
    }
}

#[async_trait]
impl ProviderGateway for FakeGateway {
    async fn send(&self, task: &TaskDefinition, _prompt: &str) -> Result<String, GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.send_calls.lock().push(task.id.clone());
        if self.failing.lock().contains(&task.id) {
            return Err(GatewayError::Api {
                status: 500,
                message: "injected failure".into(),
                retryable: true,
            });
        }
        Ok(self.reply_for(&task.id))
    }

    async fn send_batch(
        &self,
        tasks: &[TaskDefinition],
        _prompts: &[String],
    ) -> Result<Vec<String>, GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.batch_calls
            .lock()
            .push(tasks.iter().map(|t| t.id.clone()).collect());
        if tasks.iter().any(|t| self.failing.lock().contains(&t.id)) {
            return Err(GatewayError::Network {
                message: "injected batch failure".into(),
            });
        }
        Ok(tasks.iter().map(|t| self.reply_for(&t.id)).collect())
    }
}

struct FakePrompts;

impl PromptBuilder for FakePrompts {
    fn build(
        &self,
        task: &TaskDefinition,
        context: &PromptContext,
    ) -> Result<String, PromptError> {
        Ok(format!(
            "prompt for {} at {} over {} messages",
            task.id,
            context.position,
            context.messages.len()
        ))
    }
}

#[derive(Default)]
struct FakeTarget {
    blocks: Mutex<BTreeMap<String, StoredResult>>,
    loading: Mutex<BTreeSet<String>>,
    errors: Mutex<Vec<(String, TaskFailure)>>,
    attach_calls: AtomicUsize,
    fail_next_attaches: AtomicUsize,
}

impl FakeTarget {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn has(&self, key: &ResultKey) -> bool {
        self.blocks.lock().contains_key(&key.to_string())
    }

    fn attach_count(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    fn fail_next_attach(&self, count: usize) {
        self.fail_next_attaches.store(count, Ordering::SeqCst);
    }

    fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    fn clear_blocks(&self) {
        self.blocks.lock().clear();
    }
}

#[async_trait]
impl ProjectionTarget for FakeTarget {
    async fn set_loading(&self, key: &ResultKey, loading: bool) {
        if loading {
            let _ = self.loading.lock().insert(key.to_string());
        } else {
            let _ = self.loading.lock().remove(&key.to_string());
        }
    }

    async fn has_block(&self, key: &ResultKey) -> bool {
        self.has(key)
    }

    async fn attach_result(
        &self,
        key: &ResultKey,
        result: &StoredResult,
    ) -> Result<(), ProjectionError> {
        let _ = self.attach_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_next_attaches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_attaches.store(remaining - 1, Ordering::SeqCst);
            return Err(ProjectionError::new(key.clone(), "ui unavailable"));
        }
        let _ = self.blocks.lock().insert(key.to_string(), result.clone());
        Ok(())
    }

    async fn detach_result(&self, key: &ResultKey) {
        let _ = self.blocks.lock().remove(&key.to_string());
    }

    async fn attach_error(&self, key: &ResultKey, failure: &TaskFailure) {
        self.errors.lock().push((key.to_string(), failure.clone()));
    }
}

#[derive(Default)]
struct FakeDurable {
    flushes: AtomicUsize,
}

impl FakeDurable {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistChannel for FakeDurable {
    fn name(&self) -> &str {
        "fake-durable"
    }

    async fn persist(&self) -> Result<(), PersistError> {
        let _ = self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────────────────────────

fn task(id: &str) -> TaskDefinition {
    TaskDefinition {
        id: TaskId::from(id),
        name: id.to_uppercase(),
        enabled: true,
        trigger_mode: TriggerMode::Auto,
        trigger_config: None,
        request_mode: RequestMode::Standalone,
        response_location: ResponseLocation::SideChannel,
        format_style: FormatStyle::default(),
        model: ModelConfig::default(),
    }
}

fn inline_task(id: &str) -> TaskDefinition {
    TaskDefinition {
        response_location: ResponseLocation::Inline,
        ..task(id)
    }
}

fn batch_task(id: &str, key: &str) -> TaskDefinition {
    TaskDefinition {
        request_mode: RequestMode::Batch { key: key.into() },
        ..task(id)
    }
}

fn trigger_task(id: &str, keywords: &[&str]) -> TaskDefinition {
    TaskDefinition {
        trigger_mode: TriggerMode::Trigger,
        trigger_config: Some(TriggerConfig::keywords(keywords.iter().copied())),
        ..task(id)
    }
}

fn manual_task(id: &str) -> TaskDefinition {
    TaskDefinition {
        trigger_mode: TriggerMode::Manual,
        ..task(id)
    }
}

fn key(position: usize, variant: u32, id: &str) -> ResultKey {
    ResultKey::new(
        Position::new(position),
        VariantId::new(variant),
        TaskId::from(id),
    )
}

fn pos_event(position: usize) -> EventPayload {
    EventPayload::Position {
        position: Position::new(position),
    }
}

struct Harness {
    store: Arc<MemoryChatStore>,
    gateway: Arc<FakeGateway>,
    target: Arc<FakeTarget>,
    orch: Arc<Orchestrator>,
}

fn fast_settings() -> AsideSettings {
    let mut settings = AsideSettings::default();
    settings.engine.settle_delay_ms = 0;
    settings.engine.projection_retry_delay_ms = 10;
    settings
}

fn harness_with(gateway: Arc<FakeGateway>, tasks: Vec<TaskDefinition>) -> Harness {
    let store = Arc::new(MemoryChatStore::with_greeting("welcome, traveler"));
    let _ = store.push(Role::User, "hi there");
    let _ = store.push(Role::Assistant, "well met");
    let target = FakeTarget::new();
    let deps = EngineDeps::new(
        Arc::clone(&store) as Arc<dyn ChatStore>,
        Arc::clone(&gateway) as Arc<dyn ProviderGateway>,
        Arc::new(FakePrompts),
        Arc::clone(&target) as Arc<dyn ProjectionTarget>,
    );
    let orch = Orchestrator::new(
        deps,
        Arc::new(TaskRegistry::with_tasks(tasks)),
        &fast_settings(),
    );
    Harness {
        store,
        gateway,
        target,
        orch,
    }
}

fn harness(tasks: Vec<TaskDefinition>) -> Harness {
    harness_with(FakeGateway::new(), tasks)
}

fn harness_with_writer(
    tasks: Vec<TaskDefinition>,
    channel: Arc<FakeDurable>,
    debounce: Duration,
) -> Harness {
    let store = Arc::new(MemoryChatStore::with_greeting("welcome, traveler"));
    let _ = store.push(Role::User, "hi there");
    let _ = store.push(Role::Assistant, "well met");
    let gateway = FakeGateway::new();
    let target = FakeTarget::new();
    let mut deps = EngineDeps::new(
        Arc::clone(&store) as Arc<dyn ChatStore>,
        Arc::clone(&gateway) as Arc<dyn ProviderGateway>,
        Arc::new(FakePrompts),
        Arc::clone(&target) as Arc<dyn ProjectionTarget>,
    );
    deps.writer = Some(Arc::new(CoalescingWriter::spawn(
        vec![channel as Arc<dyn PersistChannel>],
        debounce,
    )));
    let orch = Orchestrator::new(
        deps,
        Arc::new(TaskRegistry::with_tasks(tasks)),
        &fast_settings(),
    );
    Harness {
        store,
        gateway,
        target,
        orch,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduling and dedup
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn auto_task_runs_and_stores_result() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    let k = key(2, 0, "notes");
    let stored = h.store.result(&k).expect("result stored");
    assert_eq!(stored.content, "reply for notes");
    assert!(!stored.edited);
    assert!(h.target.has(&k));
    assert!(h.orch.last_committed().is_some());
    assert!(!h.orch.is_busy());
}

#[tokio::test(start_paused = true)]
async fn duplicate_event_is_deduped() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    assert_eq!(h.gateway.total_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn regeneration_reenables_execution() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    assert_eq!(h.gateway.total_calls(), 1);

    h.store
        .regenerate_active(Position::new(2), "well met, regenerated")
        .unwrap();
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    assert_eq!(h.gateway.total_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn seed_position_is_never_processed() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(0)).await;
    assert_eq!(h.gateway.total_calls(), 0);
    assert!(h.orch.last_committed().is_none());
}

#[tokio::test(start_paused = true)]
async fn empty_payload_falls_back_to_most_recent() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(EventPayload::Empty).await;
    assert!(h.store.result(&key(2, 0, "notes")).is_some());
}

#[tokio::test(start_paused = true)]
async fn unresolvable_event_on_seed_only_log_mutates_nothing() {
    let h = harness(vec![task("notes")]);
    // Rebuild: a log holding only the greeting.
    let store = Arc::new(MemoryChatStore::with_greeting("welcome"));
    let deps = EngineDeps::new(
        Arc::clone(&store) as Arc<dyn ChatStore>,
        Arc::clone(&h.gateway) as Arc<dyn ProviderGateway>,
        Arc::new(FakePrompts),
        Arc::clone(&h.target) as Arc<dyn ProjectionTarget>,
    );
    let orch = Orchestrator::new(
        deps,
        Arc::new(TaskRegistry::with_tasks(vec![task("notes")])),
        &fast_settings(),
    );
    Arc::clone(&orch).dispatch(EventPayload::Empty).await;
    assert_eq!(h.gateway.total_calls(), 0);
    assert!(orch.last_committed().is_none());
}

#[tokio::test(start_paused = true)]
async fn user_turn_events_are_skipped() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(1)).await;
    assert_eq!(h.gateway.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn busy_coalesces_events_to_latest() {
    let h = harness_with(
        FakeGateway::with_delay(Duration::from_millis(100)),
        vec![task("notes")],
    );
    let first = tokio::spawn(Arc::clone(&h.orch).dispatch(pos_event(2)));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(h.orch.is_busy());

    let _ = h.store.push(Role::Assistant, "third turn");
    let _ = h.store.push(Role::Assistant, "fourth turn");
    Arc::clone(&h.orch).dispatch(pos_event(3)).await;
    Arc::clone(&h.orch).dispatch(pos_event(4)).await;

    first.await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    // The event for position 3 was overwritten in the pending slot.
    assert!(h.store.result(&key(2, 0, "notes")).is_some());
    assert!(h.store.result(&key(3, 0, "notes")).is_none());
    assert!(h.store.result(&key(4, 0, "notes")).is_some());
    assert_eq!(h.gateway.total_calls(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Triggers
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn queued_trigger_runs_and_is_consumed() {
    let h = harness(vec![trigger_task("combat", &["sword"])]);
    let queued = h.orch.notify_user_turn("He drew his SWORD and charged");
    assert_eq!(queued, vec![TaskId::from("combat")]);

    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    assert!(h.store.result(&key(2, 0, "combat")).is_some());
    assert!(h.orch.queued_triggers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn non_matching_user_turn_queues_nothing() {
    let h = harness(vec![trigger_task("combat", &["sword"])]);
    assert!(h.orch.notify_user_turn("a quiet walk in the garden").is_empty());
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    assert_eq!(h.gateway.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn fallback_rechecks_previous_user_turn() {
    let h = harness(vec![trigger_task("combat", &["sword"])]);
    // The user-turn notification was never delivered.
    h.store
        .set_content(Position::new(1), VariantId::new(0), "I raise my sword".into())
        .unwrap();
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    assert!(h.store.result(&key(2, 0, "combat")).is_some());
}

#[tokio::test(start_paused = true)]
async fn failed_trigger_stays_queued() {
    let h = harness(vec![trigger_task("combat", &["sword"])]);
    h.gateway.set_failing("combat");
    let _ = h.orch.notify_user_turn("sword time");

    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    assert!(h.orch.queued_triggers().contains(&TaskId::from("combat")));
    // Every task failed, so nothing was committed and the same turn can
    // run again.
    assert!(h.orch.last_committed().is_none());

    h.gateway.clear_failures();
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    assert!(h.store.result(&key(2, 0, "combat")).is_some());
    assert!(h.orch.queued_triggers().is_empty());
    assert!(h.orch.last_committed().is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn batch_tasks_share_one_outbound_call() {
    let h = harness(vec![
        batch_task("a", "main"),
        batch_task("b", "main"),
        task("solo"),
    ]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    let batches = h.gateway.batch_calls.lock().clone();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(h.gateway.send_calls.lock().len(), 1);
    assert!(h.store.result(&key(2, 0, "a")).is_some());
    assert!(h.store.result(&key(2, 0, "b")).is_some());
    assert!(h.store.result(&key(2, 0, "solo")).is_some());
}

#[tokio::test(start_paused = true)]
async fn one_failure_never_cancels_siblings() {
    let h = harness(vec![task("good"), task("bad")]);
    h.gateway.set_failing("bad");
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    assert!(h.store.result(&key(2, 0, "good")).is_some());
    assert!(h.store.result(&key(2, 0, "bad")).is_none());
    assert_eq!(h.target.error_count(), 1);
    // Partial success still commits the triple.
    assert!(h.orch.last_committed().is_some());
}

#[tokio::test(start_paused = true)]
async fn responses_are_sanitized_before_storage() {
    let h = harness(vec![task("notes")]);
    h.gateway
        .set_response("notes", "<script>alert(1)</script>all clear");
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    let stored = h.store.result(&key(2, 0, "notes")).unwrap();
    assert_eq!(stored.content, "all clear");
}

// ─────────────────────────────────────────────────────────────────────────────
// Manual and retry entrypoints
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn manual_runs_all_manual_tasks_when_set_empty() {
    let h = harness(vec![manual_task("m1"), manual_task("m2"), task("auto")]);
    let report = h.orch.run_manual(&[]).await.unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert!(h.store.result(&key(2, 0, "m1")).is_some());
    assert!(h.store.result(&key(2, 0, "m2")).is_some());
    // Auto tasks are not part of a manual run.
    assert!(h.store.result(&key(2, 0, "auto")).is_none());
    // Manual runs never touch the dedup triple.
    assert!(h.orch.last_committed().is_none());
}

#[tokio::test(start_paused = true)]
async fn manual_rejects_while_busy() {
    let h = harness_with(
        FakeGateway::with_delay(Duration::from_millis(100)),
        vec![task("notes"), manual_task("m")],
    );
    let run = tokio::spawn(Arc::clone(&h.orch).dispatch(pos_event(2)));
    tokio::time::sleep(Duration::from_millis(5)).await;

    let err = h.orch.run_manual(&[]).await.unwrap_err();
    assert_matches!(err, SchedulerError::Busy);
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn manual_unknown_task_is_rejected() {
    let h = harness(vec![manual_task("m")]);
    let err = h
        .orch
        .run_manual(&[TaskId::from("missing")])
        .await
        .unwrap_err();
    assert_matches!(err, SchedulerError::UnknownTask(_));
    assert!(!h.orch.is_busy());
}

#[tokio::test(start_paused = true)]
async fn retry_rejects_seed_position() {
    let h = harness(vec![task("notes")]);
    let err = h
        .orch
        .retry(RetryRequest {
            task: TaskId::from("notes"),
            position: Position::new(0),
            variant: VariantId::new(0),
        })
        .await
        .unwrap_err();
    assert_matches!(err, SchedulerError::NoTarget);
    assert_eq!(h.gateway.total_calls(), 0);
    assert!(!h.orch.is_busy());
}

#[tokio::test(start_paused = true)]
async fn retry_overwrites_the_stored_result() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    let committed = h.orch.last_committed();

    h.gateway.set_response("notes", "second attempt");
    let report = h
        .orch
        .retry(RetryRequest {
            task: TaskId::from("notes"),
            position: Position::new(2),
            variant: VariantId::new(0),
        })
        .await
        .unwrap();
    assert!(report.outcomes[0].succeeded());
    assert_eq!(
        h.store.result(&key(2, 0, "notes")).unwrap().content,
        "second attempt"
    );
    assert_eq!(h.orch.last_committed(), committed);
}

#[tokio::test(start_paused = true)]
async fn edited_flag_survives_identical_overwrite_only() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    // The user hand-edits the stored content out of band.
    let k = key(2, 0, "notes");
    let mut edited = h.store.result(&k).unwrap();
    edited.edited = true;
    h.store.upsert_result(&k, edited).unwrap();

    // Identical regenerated content preserves the edit mark.
    let request = RetryRequest {
        task: TaskId::from("notes"),
        position: Position::new(2),
        variant: VariantId::new(0),
    };
    let _ = h.orch.retry(request.clone()).await.unwrap();
    assert!(h.store.result(&k).unwrap().edited);

    // Fresh content clears it.
    h.gateway.set_response("notes", "brand new text");
    let _ = h.orch.retry(request).await.unwrap();
    let stored = h.store.result(&k).unwrap();
    assert!(!stored.edited);
    assert_eq!(stored.content, "brand new text");
}

// ─────────────────────────────────────────────────────────────────────────────
// Projection
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn inline_result_merges_into_primary_content() {
    let h = harness(vec![inline_task("tracker")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    let content = h
        .store
        .message(Position::new(2))
        .unwrap()
        .active()
        .unwrap()
        .content
        .clone();
    assert!(content.starts_with("well met"));
    assert!(content.contains(INLINE_REGION_BEGIN));
    assert!(content.contains("reply for tracker"));
    // Inline tasks do not get a side-channel block.
    assert!(!h.target.has(&key(2, 0, "tracker")));
}

#[tokio::test(start_paused = true)]
async fn delete_removes_one_result_and_preserves_siblings() {
    let h = harness(vec![inline_task("tracker"), task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    let removed = h.orch.delete_result(&key(2, 0, "tracker")).await.unwrap();
    assert!(removed.is_some());

    let content = h
        .store
        .message(Position::new(2))
        .unwrap()
        .active()
        .unwrap()
        .content
        .clone();
    assert_eq!(content, "well met");
    assert!(h.store.result(&key(2, 0, "notes")).is_some());
    assert!(h.target.has(&key(2, 0, "notes")));
}

#[tokio::test(start_paused = true)]
async fn restore_replays_blocks_without_duplicates() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    // Simulate a UI reload that lost every block.
    h.target.clear_blocks();
    let before = h.target.attach_count();
    h.orch.restore(Position::new(2)).await.unwrap();
    assert!(h.target.has(&key(2, 0, "notes")));
    assert_eq!(h.target.attach_count(), before + 1);

    // A second restore is guarded by has_block.
    h.orch.restore(Position::new(2)).await.unwrap();
    assert_eq!(h.target.attach_count(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn attach_failure_is_retried_once() {
    let h = harness(vec![task("notes")]);
    h.target.fail_next_attach(1);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    assert!(h.target.has(&key(2, 0, "notes")));
    assert_eq!(h.target.attach_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn attach_failure_after_retry_is_skipped_but_stored() {
    let h = harness(vec![task("notes")]);
    h.target.fail_next_attach(2);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    let k = key(2, 0, "notes");
    assert!(!h.target.has(&k));
    // The stored result remains the source of truth; restore replays it.
    assert!(h.store.result(&k).is_some());
    h.orch.restore(Position::new(2)).await.unwrap();
    assert!(h.target.has(&k));
}

#[tokio::test(start_paused = true)]
async fn run_coalesces_persistence_into_one_flush() {
    let durable = FakeDurable::new();
    let h = harness_with_writer(
        vec![task("notes"), task("summary"), inline_task("tracker")],
        Arc::clone(&durable),
        Duration::from_millis(100),
    );
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;

    // Every upsert and inline refresh touched the writer, but nothing
    // flushed inside the debounce window.
    assert!(h.store.result(&key(2, 0, "notes")).is_some());
    assert!(h.store.result(&key(2, 0, "summary")).is_some());
    assert_eq!(durable.flushes(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(durable.flushes(), 1);
}

#[tokio::test(start_paused = true)]
async fn variant_switch_restore_never_triggers_execution() {
    let h = harness(vec![task("notes")]);
    Arc::clone(&h.orch).dispatch(pos_event(2)).await;
    let calls = h.gateway.total_calls();

    let _ = h.store.add_variant(Position::new(2), "alternate reply").unwrap();
    h.orch.restore(Position::new(2)).await.unwrap();
    assert_eq!(h.gateway.total_calls(), calls);

    // Switching back re-derives the original variant's block purely.
    h.store.set_active_variant(Position::new(2), VariantId::new(0)).unwrap();
    h.target.clear_blocks();
    h.orch.restore(Position::new(2)).await.unwrap();
    assert!(h.target.has(&key(2, 0, "notes")));
    assert_eq!(h.gateway.total_calls(), calls);
}
