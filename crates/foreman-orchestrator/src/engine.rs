use crate::analytics::QueueAnalytics;
use crate::degradation::{DegradationCause, DegradationController};
use crate::recommend::BotRecommender;
use crate::task_graph::TaskGraph;
use crate::types::{Assignment, BotHealth, ExecutionRecord, TaskSpec, TaskStatus};
use foreman_audit::{AuditEvent, AuditOutcome, EventSink};
use foreman_core::{Clock, ForemanError, ForemanResult};
use foreman_store::TaskStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Gate for dispatching work at all.
const FEATURE_TASK_ROUTING: &str = "task-routing";
/// Gate for recommendation-driven worker selection.
const FEATURE_ADAPTIVE_SCHEDULING: &str = "adaptive-scheduling";

#[derive(Debug, Clone)]
struct BotEntry {
    health: BotHealth,
    online: bool,
}

/// Status counts over the loaded graph.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GraphProgress {
    /// All tasks in the graph.
    pub total: usize,
    /// Tasks waiting on dependencies.
    pub pending: usize,
    /// Tasks eligible for dispatch.
    pub ready: usize,
    /// Tasks currently executing.
    pub in_progress: usize,
    /// Tasks finished successfully.
    pub complete: usize,
    /// Tasks given up on.
    pub blocked: usize,
}

/// The composition root: wires the task graph, analytics, the degradation
/// controller, and the external collaborators into a scheduling loop.
///
/// On each [`tick`](Orchestrator::tick) it collects ready tasks, consults the
/// recommendation provider (when adaptive scheduling is enabled), falls back
/// through the degradation controller when the preferred worker is
/// unavailable, and feeds completion telemetry back into analytics and the
/// graph via [`complete_task`](Orchestrator::complete_task).
pub struct Orchestrator {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    store: Arc<dyn TaskStore>,
    recommender: Arc<dyn BotRecommender>,
    graph: RwLock<Option<TaskGraph>>,
    analytics: QueueAnalytics,
    degradation: DegradationController,
    bots: RwLock<HashMap<String, BotEntry>>,
    history: RwLock<Vec<ExecutionRecord>>,
}

impl Orchestrator {
    /// Create an orchestrator with no specification loaded.
    pub fn new(
        clock: Arc<dyn Clock>,
        recommender: Arc<dyn BotRecommender>,
        store: Arc<dyn TaskStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            analytics: QueueAnalytics::new(clock.clone()),
            degradation: DegradationController::new(clock.clone(), sink.clone()),
            clock,
            sink,
            store,
            recommender,
            graph: RwLock::new(None),
            bots: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }

    /// The analytics component.
    pub fn analytics(&self) -> &QueueAnalytics {
        &self.analytics
    }

    /// The degradation controller.
    pub fn degradation(&self) -> &DegradationController {
        &self.degradation
    }

    /// Register a worker (or refresh its health) and mark it online.
    pub async fn register_bot(&self, bot_id: impl Into<String>, health: BotHealth) {
        let mut bots = self.bots.write().await;
        bots.insert(
            bot_id.into(),
            BotEntry {
                health,
                online: true,
            },
        );
        let (active, total) = Self::pool_counts(&bots);
        drop(bots);
        self.degradation.set_worker_counts(active, total).await;
    }

    /// Mark a worker offline. Returns false for unknown workers.
    pub async fn mark_bot_offline(&self, bot_id: &str) -> bool {
        let mut bots = self.bots.write().await;
        let Some(entry) = bots.get_mut(bot_id) else {
            return false;
        };
        entry.online = false;
        let (active, total) = Self::pool_counts(&bots);
        drop(bots);
        self.degradation.set_worker_counts(active, total).await;
        true
    }

    fn pool_counts(bots: &HashMap<String, BotEntry>) -> (usize, usize) {
        let active = bots.values().filter(|b| b.online).count();
        (active, bots.len())
    }

    /// Build the dependency graph from `spec`, persist every task payload,
    /// and stamp the initial queue timestamps.
    ///
    /// A cycle in the specification is fatal: nothing is loaded and the
    /// error carries the unresolved task ids.
    pub async fn load_spec(&self, spec: &TaskSpec) -> ForemanResult<()> {
        let graph = TaskGraph::build(spec)?;
        let now = self.clock.now();

        for node in graph.tasks() {
            let payload = serde_json::to_value(node)?;
            let path = self.store.persist(&node.id, &payload).await?;
            tracing::debug!(task = %node.id, path = %path.display(), "task persisted");
        }

        // Zero-dependency tasks are queued from the start.
        for node in graph.tasks().filter(|n| n.status == TaskStatus::Ready) {
            self.analytics
                .record_task_latency(&node.id, &node.intent, "", Some(now), None, None)
                .await;
        }

        info!(spec = %spec.spec_id, tasks = graph.len(), "specification loaded");
        self.sink.emit(
            AuditEvent::new(now, "engine", "load_spec", AuditOutcome::Applied).with_details(
                serde_json::json!({
                    "spec_id": spec.spec_id,
                    "tasks": graph.len(),
                    "execution_order": graph.execution_order(),
                }),
            ),
        );

        *self.graph.write().await = Some(graph);
        Ok(())
    }

    /// The execution order and parallel groups of the loaded graph.
    pub async fn execution_plan(&self) -> ForemanResult<(Vec<String>, Vec<Vec<String>>)> {
        let guard = self.graph.read().await;
        let graph = guard
            .as_ref()
            .ok_or_else(|| ForemanError::Orchestrator("no specification loaded".to_string()))?;
        Ok((graph.execution_order().to_vec(), graph.get_parallel_groups()))
    }

    /// Status counts over the loaded graph.
    pub async fn progress(&self) -> ForemanResult<GraphProgress> {
        let guard = self.graph.read().await;
        let graph = guard
            .as_ref()
            .ok_or_else(|| ForemanError::Orchestrator("no specification loaded".to_string()))?;
        let mut progress = GraphProgress {
            total: graph.len(),
            ..GraphProgress::default()
        };
        for node in graph.tasks() {
            match node.status {
                TaskStatus::Pending => progress.pending += 1,
                TaskStatus::Ready => progress.ready += 1,
                TaskStatus::InProgress => progress.in_progress += 1,
                TaskStatus::Complete => progress.complete += 1,
                TaskStatus::Blocked => progress.blocked += 1,
            }
        }
        Ok(progress)
    }

    /// True when every task in the loaded graph is terminal.
    pub async fn is_done(&self) -> bool {
        let guard = self.graph.read().await;
        guard.as_ref().is_some_and(TaskGraph::is_done)
    }

    /// One scheduling tick: dispatch every ready task to a worker.
    ///
    /// Returns the assignments made. Dispatch is gated on the
    /// `task-routing` feature; worker choice uses the recommendation
    /// provider while `adaptive-scheduling` is enabled and falls back to the
    /// lexicographically first healthy worker otherwise. When the preferred
    /// worker is offline the degradation controller's fallback selection
    /// picks a stand-in.
    ///
    /// Fails with an orchestrator error when the graph can make no further
    /// progress: nothing ready, nothing running, tasks left unfinished.
    pub async fn tick(&self) -> ForemanResult<Vec<Assignment>> {
        let now = self.clock.now();

        if !self.degradation.is_feature_enabled(FEATURE_TASK_ROUTING).await {
            warn!("task routing disabled; tick makes no assignments");
            self.sink.emit(AuditEvent::new(
                now,
                "engine",
                "tick",
                AuditOutcome::Rejected,
            ));
            return Ok(Vec::new());
        }
        let adaptive = self
            .degradation
            .is_feature_enabled(FEATURE_ADAPTIVE_SCHEDULING)
            .await;

        // Read phase: ready set and stall detection.
        let ready: Vec<(String, String)> = {
            let guard = self.graph.read().await;
            let graph = guard.as_ref().ok_or_else(|| {
                ForemanError::Orchestrator("no specification loaded".to_string())
            })?;

            let ready: Vec<(String, String)> = graph
                .get_ready_tasks()
                .into_iter()
                .map(|n| (n.id.clone(), n.intent.clone()))
                .collect();

            if ready.is_empty() && !graph.is_done() {
                let executing = graph
                    .tasks()
                    .filter(|n| n.status == TaskStatus::InProgress)
                    .count();
                if executing == 0 {
                    let stuck: Vec<&str> = graph
                        .tasks()
                        .filter(|n| !n.status.is_terminal())
                        .map(|n| n.id.as_str())
                        .collect();
                    return Err(ForemanError::Orchestrator(format!(
                        "scheduling stalled: no task is ready or running, unfinished: {stuck:?}"
                    )));
                }
            }
            ready
        };
        if ready.is_empty() {
            return Ok(Vec::new());
        }

        // Snapshot the worker pool and execution history.
        let (candidates, health_map) = {
            let bots = self.bots.read().await;
            let mut candidates: Vec<String> = bots
                .iter()
                .filter(|(_, b)| b.online)
                .map(|(id, _)| id.clone())
                .collect();
            candidates.sort();
            let health_map: HashMap<String, BotHealth> = bots
                .iter()
                .filter(|(_, b)| b.online)
                .map(|(id, b)| (id.clone(), b.health))
                .collect();
            (candidates, health_map)
        };
        if candidates.is_empty() {
            warn!("no online workers; tick makes no assignments");
            return Ok(Vec::new());
        }
        let history = self.history.read().await.clone();

        // Decide a worker per ready task.
        let mut decisions: Vec<Assignment> = Vec::with_capacity(ready.len());
        for (task_id, intent) in &ready {
            let decision = if adaptive {
                let recommendation = self.recommender.recommend(intent, &history).await?;
                let preferred = recommendation.recommended_bot.clone();
                match preferred {
                    Some(bot) if health_map.contains_key(&bot) => Assignment {
                        task_id: task_id.clone(),
                        bot_id: bot,
                        confidence: recommendation.confidence,
                        fallback: false,
                        reason: recommendation.reason,
                    },
                    _ => {
                        let Some(fallback) =
                            self.degradation.get_fallback_bot(&candidates, &health_map)
                        else {
                            warn!(task = %task_id, "no fallback worker available");
                            continue;
                        };
                        Assignment {
                            task_id: task_id.clone(),
                            bot_id: fallback,
                            confidence: recommendation.confidence,
                            fallback: true,
                            reason: match preferred {
                                Some(p) => format!("preferred worker '{p}' unavailable"),
                                None => "no preferred worker; fallback selection".to_string(),
                            },
                        }
                    }
                }
            } else {
                // Adaptive scheduling disabled: cheapest deterministic choice.
                Assignment {
                    task_id: task_id.clone(),
                    bot_id: candidates[0].clone(),
                    confidence: 0.0,
                    fallback: false,
                    reason: "adaptive scheduling disabled; first healthy worker".to_string(),
                }
            };
            decisions.push(decision);
        }

        // Write phase: apply the transitions and stamp latency timestamps.
        let mut applied = Vec::with_capacity(decisions.len());
        {
            let mut guard = self.graph.write().await;
            let graph = guard.as_mut().ok_or_else(|| {
                ForemanError::Orchestrator("no specification loaded".to_string())
            })?;
            for decision in decisions {
                if !graph.mark_in_progress(&decision.task_id) {
                    continue;
                }
                applied.push(decision);
            }
        }

        for assignment in &applied {
            let intent = ready
                .iter()
                .find(|(id, _)| *id == assignment.task_id)
                .map(|(_, intent)| intent.clone())
                .unwrap_or_default();
            self.analytics
                .record_task_latency(
                    &assignment.task_id,
                    &intent,
                    &assignment.bot_id,
                    None,
                    Some(now),
                    None,
                )
                .await;
            info!(
                task = %assignment.task_id,
                bot = %assignment.bot_id,
                fallback = assignment.fallback,
                "task assigned"
            );
            self.sink.emit(
                AuditEvent::new(now, "engine", "assign", AuditOutcome::Applied)
                    .with_task(assignment.task_id.clone())
                    .with_details(serde_json::json!({
                        "bot": assignment.bot_id,
                        "confidence": assignment.confidence,
                        "fallback": assignment.fallback,
                    })),
            );
        }

        Ok(applied)
    }

    /// Feed a completion callback into the graph and analytics.
    ///
    /// On success the task is marked Complete and the newly unblocked task
    /// ids are returned (and queued for the next tick). On failure the task
    /// is marked Blocked and the list is empty. Unknown ids are a no-op.
    pub async fn complete_task(
        &self,
        task_id: &str,
        bot_id: &str,
        success: bool,
    ) -> ForemanResult<Vec<String>> {
        let now = self.clock.now();

        let (intent, unblocked) = {
            let mut guard = self.graph.write().await;
            let graph = guard.as_mut().ok_or_else(|| {
                ForemanError::Orchestrator("no specification loaded".to_string())
            })?;
            let intent = graph.get(task_id).map(|n| n.intent.clone());
            let unblocked = if success {
                graph.mark_complete(task_id)
            } else {
                graph.mark_blocked(task_id);
                Vec::new()
            };
            (intent, unblocked)
        };
        let Some(intent) = intent else {
            return Ok(Vec::new());
        };

        self.analytics
            .record_task_latency(task_id, &intent, bot_id, None, None, Some(now))
            .await;

        let execution_time_ms = self
            .analytics
            .get_task_latency(task_id)
            .await
            .and_then(|r| r.execution_ms)
            .and_then(|ms| u64::try_from(ms).ok())
            .unwrap_or(0);
        self.history.write().await.push(ExecutionRecord {
            bot_id: bot_id.to_string(),
            task_type: intent.clone(),
            execution_time_ms,
            success,
        });

        // Newly unblocked tasks enter the queue now.
        {
            let guard = self.graph.read().await;
            if let Some(graph) = guard.as_ref() {
                for unblocked_id in &unblocked {
                    if let Some(node) = graph.get(unblocked_id) {
                        self.analytics
                            .record_task_latency(
                                unblocked_id,
                                &node.intent,
                                "",
                                Some(now),
                                None,
                                None,
                            )
                            .await;
                    }
                }
            }
        }

        info!(
            task = task_id,
            bot = bot_id,
            success,
            unblocked = unblocked.len(),
            "task completion recorded"
        );
        self.sink.emit(
            AuditEvent::new(now, "engine", "complete_task", AuditOutcome::Applied)
                .with_task(task_id)
                .with_details(serde_json::json!({
                    "bot": bot_id,
                    "success": success,
                    "newly_unblocked": unblocked,
                })),
        );

        Ok(unblocked)
    }

    /// Periodic resource probe: evaluate degradation constraints with the
    /// current worker pool and feed a queue snapshot into analytics.
    pub async fn probe_resources(
        &self,
        memory_percent: f64,
        cpu_percent: f64,
    ) -> ForemanResult<Option<DegradationCause>> {
        let (active, total) = {
            let bots = self.bots.read().await;
            Self::pool_counts(&bots)
        };
        let cause = self
            .degradation
            .apply_resource_constraints(memory_percent, cpu_percent, active, total)
            .await;

        let (depth, executing, completed) = {
            let guard = self.graph.read().await;
            match guard.as_ref() {
                Some(graph) => {
                    let depth = graph.get_ready_tasks().len();
                    let executing = graph
                        .tasks()
                        .filter(|n| n.status == TaskStatus::InProgress)
                        .count();
                    let completed = graph
                        .tasks()
                        .filter(|n| n.status == TaskStatus::Complete)
                        .count();
                    (depth, executing, completed)
                }
                None => (0, 0, 0),
            }
        };
        let (avg_wait_ms, avg_execution_ms) = self.analytics.aggregate_means().await;
        self.analytics
            .record_queue_snapshot(depth, executing, completed, avg_wait_ms, avg_execution_ms)
            .await;

        Ok(cause)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::recommend::HistoryRecommender;
    use crate::types::{BotRecommendation, Priority, TaskSpecEntry};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono::Utc;
    use foreman_audit::NoopSink;
    use foreman_core::ManualClock;

    /// In-memory task store for engine tests.
    #[derive(Default)]
    struct MemStore {
        saved: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskStore for MemStore {
        async fn persist(
            &self,
            task_id: &str,
            _payload: &serde_json::Value,
        ) -> ForemanResult<std::path::PathBuf> {
            self.saved.lock().unwrap().push(task_id.to_string());
            Ok(std::path::PathBuf::from(format!("/mem/{task_id}.json")))
        }

        async fn load(&self, _task_id: &str) -> ForemanResult<Option<serde_json::Value>> {
            Ok(None)
        }

        async fn list(&self) -> ForemanResult<Vec<String>> {
            Ok(self.saved.lock().unwrap().clone())
        }
    }

    /// Recommender with a fixed preference.
    struct FixedRecommender {
        preferred: Option<String>,
    }

    #[async_trait]
    impl BotRecommender for FixedRecommender {
        async fn recommend(
            &self,
            task_type: &str,
            _history: &[ExecutionRecord],
        ) -> ForemanResult<BotRecommendation> {
            Ok(BotRecommendation {
                task_type: task_type.to_string(),
                recommended_bot: self.preferred.clone(),
                confidence: 0.9,
                reason: "fixed preference".to_string(),
                alternatives: Vec::new(),
            })
        }
    }

    fn entry(id: &str, deps: &[&str]) -> TaskSpecEntry {
        TaskSpecEntry {
            task_id: id.to_string(),
            title: format!("Task {id}"),
            intent: "build".to_string(),
            summary: String::new(),
            depends_on: deps.iter().map(|d| (*d).to_string()).collect(),
            assignee: None,
            files: vec![],
            priority: Priority::default(),
        }
    }

    fn diamond_spec() -> TaskSpec {
        TaskSpec {
            spec_id: "spec-1".to_string(),
            title: "Diamond".to_string(),
            tasks: vec![
                entry("A", &[]),
                entry("B", &["A"]),
                entry("C", &["A"]),
                entry("D", &["B", "C"]),
            ],
        }
    }

    fn healthy() -> BotHealth {
        BotHealth {
            success_rate: 0.9,
            cpu_fraction: 0.2,
        }
    }

    fn orchestrator(preferred: Option<&str>) -> (Arc<ManualClock>, Orchestrator) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap(),
        ));
        let orchestrator = Orchestrator::new(
            clock.clone(),
            Arc::new(FixedRecommender {
                preferred: preferred.map(String::from),
            }),
            Arc::new(MemStore::default()),
            Arc::new(NoopSink),
        );
        (clock, orchestrator)
    }

    #[tokio::test]
    async fn load_spec_persists_every_task() {
        let (_, orchestrator) = orchestrator(Some("b1"));
        let store = Arc::new(MemStore::default());
        let orchestrator = Orchestrator {
            store: store.clone(),
            ..orchestrator
        };
        orchestrator.load_spec(&diamond_spec()).await.unwrap();
        let mut saved = store.saved.lock().unwrap().clone();
        saved.sort();
        assert_eq!(saved, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn cycle_is_fatal_and_loads_nothing() {
        let (_, orchestrator) = orchestrator(Some("b1"));
        let spec = TaskSpec {
            spec_id: "cyclic".to_string(),
            title: "Cyclic".to_string(),
            tasks: vec![entry("A", &["B"]), entry("B", &["A"])],
        };
        let err = orchestrator.load_spec(&spec).await.unwrap_err();
        assert!(matches!(err, ForemanError::CycleDetected { .. }));
        assert!(orchestrator.execution_plan().await.is_err());
    }

    #[tokio::test]
    async fn tick_assigns_preferred_online_worker() {
        let (_, orchestrator) = orchestrator(Some("b1"));
        orchestrator.register_bot("b1", healthy()).await;
        orchestrator.register_bot("b2", healthy()).await;
        orchestrator.load_spec(&diamond_spec()).await.unwrap();

        let assignments = orchestrator.tick().await.unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].task_id, "A");
        assert_eq!(assignments[0].bot_id, "b1");
        assert!(!assignments[0].fallback);
    }

    #[tokio::test]
    async fn tick_falls_back_when_preferred_is_offline() {
        let (_, orchestrator) = orchestrator(Some("b1"));
        orchestrator.register_bot("b1", healthy()).await;
        orchestrator
            .register_bot(
                "b2",
                BotHealth {
                    success_rate: 0.8,
                    cpu_fraction: 0.1,
                },
            )
            .await;
        orchestrator.mark_bot_offline("b1").await;
        orchestrator.load_spec(&diamond_spec()).await.unwrap();

        let assignments = orchestrator.tick().await.unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].bot_id, "b2");
        assert!(assignments[0].fallback);
        assert!(assignments[0].reason.contains("b1"));
    }

    #[tokio::test]
    async fn completion_unblocks_dependents_and_advances_the_graph() {
        let (clock, orchestrator) = orchestrator(Some("b1"));
        orchestrator.register_bot("b1", healthy()).await;
        orchestrator.load_spec(&diamond_spec()).await.unwrap();

        let first = orchestrator.tick().await.unwrap();
        assert_eq!(first[0].task_id, "A");
        clock.advance(chrono::Duration::milliseconds(120));

        let unblocked = orchestrator.complete_task("A", "b1", true).await.unwrap();
        assert_eq!(unblocked, vec!["B", "C"]);

        let second = orchestrator.tick().await.unwrap();
        let ids: Vec<&str> = second.iter().map(|a| a.task_id.as_str()).collect();
        assert_eq!(ids, ["B", "C"]);

        for id in ids {
            orchestrator.complete_task(id, "b1", true).await.unwrap();
        }
        let third = orchestrator.tick().await.unwrap();
        assert_eq!(third[0].task_id, "D");
        orchestrator.complete_task("D", "b1", true).await.unwrap();
        assert!(orchestrator.is_done().await);

        let progress = orchestrator.progress().await.unwrap();
        assert_eq!(progress.complete, 4);
        assert_eq!(progress.total, 4);
    }

    #[tokio::test]
    async fn failed_completion_blocks_the_task() {
        let (_, orchestrator) = orchestrator(Some("b1"));
        orchestrator.register_bot("b1", healthy()).await;
        orchestrator.load_spec(&diamond_spec()).await.unwrap();

        orchestrator.tick().await.unwrap();
        let unblocked = orchestrator.complete_task("A", "b1", false).await.unwrap();
        assert!(unblocked.is_empty());

        let progress = orchestrator.progress().await.unwrap();
        assert_eq!(progress.blocked, 1);

        // Dependents can never run: the next tick reports the stall.
        let err = orchestrator.tick().await.unwrap_err();
        assert!(err.to_string().contains("stalled"), "got: {err}");
    }

    #[tokio::test]
    async fn completion_telemetry_reaches_analytics() {
        let (clock, orchestrator) = orchestrator(Some("b1"));
        orchestrator.register_bot("b1", healthy()).await;
        orchestrator.load_spec(&diamond_spec()).await.unwrap();

        clock.advance(chrono::Duration::milliseconds(40));
        orchestrator.tick().await.unwrap();
        clock.advance(chrono::Duration::milliseconds(160));
        orchestrator.complete_task("A", "b1", true).await.unwrap();

        let record = orchestrator.analytics().get_task_latency("A").await.unwrap();
        assert_eq!(record.queue_wait_ms, Some(40));
        assert_eq!(record.execution_ms, Some(160));
        assert_eq!(record.total_ms, Some(200));
        assert_eq!(record.worker_id, "b1");

        // A plus the two newly queued dependents have records by now.
        let stats = orchestrator.analytics().get_type_stats("build").await.unwrap();
        assert_eq!(stats.count, 3);
    }

    #[tokio::test]
    async fn degraded_mode_still_routes_but_drops_adaptive_scheduling() {
        let (_, orchestrator) = orchestrator(Some("b2"));
        orchestrator.register_bot("b1", healthy()).await;
        orchestrator.register_bot("b2", healthy()).await;
        orchestrator.load_spec(&diamond_spec()).await.unwrap();

        // Memory pressure disables Important features, including adaptive
        // scheduling; task routing is critical and stays on.
        let cause = orchestrator.probe_resources(92.0, 30.0).await.unwrap();
        assert_eq!(cause, Some(DegradationCause::MemoryPressure));

        let assignments = orchestrator.tick().await.unwrap();
        assert_eq!(assignments.len(), 1);
        // The recommender (preferring b2) was bypassed.
        assert_eq!(assignments[0].bot_id, "b1");
        assert!(assignments[0].reason.contains("adaptive scheduling disabled"));
    }

    #[tokio::test]
    async fn probe_records_queue_snapshots() {
        let (_, orchestrator) = orchestrator(Some("b1"));
        orchestrator.register_bot("b1", healthy()).await;
        orchestrator.load_spec(&diamond_spec()).await.unwrap();
        orchestrator.probe_resources(40.0, 30.0).await.unwrap();

        match orchestrator.analytics().get_queue_status().await {
            crate::analytics::QueueStatus::Ok { queue_depth, .. } => {
                assert_eq!(queue_depth, 1); // only A is ready
            }
            crate::analytics::QueueStatus::NoData => panic!("expected snapshot"),
        }
    }

    #[tokio::test]
    async fn no_online_workers_means_no_assignments() {
        let (_, orchestrator) = orchestrator(Some("b1"));
        orchestrator.load_spec(&diamond_spec()).await.unwrap();
        let assignments = orchestrator.tick().await.unwrap();
        assert!(assignments.is_empty());
    }

    #[tokio::test]
    async fn unknown_completion_is_a_noop() {
        let (_, orchestrator) = orchestrator(Some("b1"));
        orchestrator.load_spec(&diamond_spec()).await.unwrap();
        let unblocked = orchestrator
            .complete_task("ghost", "b1", true)
            .await
            .unwrap();
        assert!(unblocked.is_empty());
    }

    #[tokio::test]
    async fn history_recommender_learns_from_completions() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap(),
        ));
        let orchestrator = Orchestrator::new(
            clock.clone(),
            Arc::new(HistoryRecommender::new()),
            Arc::new(MemStore::default()),
            Arc::new(NoopSink),
        );
        orchestrator.register_bot("b1", healthy()).await;
        orchestrator.load_spec(&diamond_spec()).await.unwrap();

        // First assignment has no history and goes through fallback.
        let first = orchestrator.tick().await.unwrap();
        assert!(first[0].fallback);
        orchestrator.complete_task("A", "b1", true).await.unwrap();

        // With history recorded, the recommender now prefers b1 directly.
        let second = orchestrator.tick().await.unwrap();
        assert!(!second[0].fallback);
        assert_eq!(second[0].bot_id, "b1");
    }
}
