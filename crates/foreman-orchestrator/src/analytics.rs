use chrono::{DateTime, Duration, Utc};
use foreman_core::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Snapshots older than this are pruned.
const SNAPSHOT_RETENTION_HOURS: i64 = 24;
/// Trailing window for the derived throughput figure.
const THROUGHPUT_WINDOW_SECS: i64 = 60;
/// How many recent snapshots feed the trend averages.
const TREND_SNAPSHOT_COUNT: usize = 10;
/// Mean queue-wait above this flags an admission bottleneck.
const QUEUE_WAIT_THRESHOLD_MS: f64 = 500.0;
/// Mean execution time above this flags an execution bottleneck.
const EXECUTION_THRESHOLD_MS: f64 = 5000.0;

/// A point-in-time observation of the work queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Tasks waiting for a worker.
    pub queue_depth: usize,
    /// Tasks currently executing.
    pub executing: usize,
    /// Tasks finished so far.
    pub completed: usize,
    /// Caller-supplied average queue wait in milliseconds.
    pub avg_wait_ms: f64,
    /// Caller-supplied average execution time in milliseconds.
    pub avg_execution_ms: f64,
    /// Latency records completed in the trailing 60 seconds.
    pub throughput_per_minute: usize,
}

/// Per-task latency timeline, enriched progressively as timestamps arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLatencyRecord {
    /// The task this record belongs to (one record per id).
    pub task_id: String,
    /// The task type, used for rolling per-type statistics.
    pub task_type: String,
    /// The worker that handled the task.
    pub worker_id: String,
    /// When the task entered the queue.
    pub queued_at: Option<DateTime<Utc>>,
    /// When a worker started executing it.
    pub executed_at: Option<DateTime<Utc>>,
    /// When execution finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// `executed_at - queued_at`, when both are present.
    pub queue_wait_ms: Option<i64>,
    /// `completed_at - executed_at`, when both are present.
    pub execution_ms: Option<i64>,
    /// `completed_at - queued_at`, when both are present.
    pub total_ms: Option<i64>,
}

impl TaskLatencyRecord {
    fn recompute_durations(&mut self) {
        self.queue_wait_ms = match (self.queued_at, self.executed_at) {
            (Some(q), Some(e)) => Some((e - q).num_milliseconds()),
            _ => None,
        };
        self.execution_ms = match (self.executed_at, self.completed_at) {
            (Some(e), Some(c)) => Some((c - e).num_milliseconds()),
            _ => None,
        };
        self.total_ms = match (self.queued_at, self.completed_at) {
            (Some(q), Some(c)) => Some((c - q).num_milliseconds()),
            _ => None,
        };
    }
}

/// Rolling statistics for one task type, recomputed on every new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTypeStats {
    /// Number of latency records for this type.
    pub count: usize,
    /// Mean queue wait over records that have one.
    pub mean_queue_wait_ms: f64,
    /// Mean execution time over records that have one.
    pub mean_execution_ms: f64,
    /// Mean total time over records that have one.
    pub mean_total_ms: f64,
    /// 95th-percentile execution time.
    pub p95_execution_ms: Option<i64>,
    /// 99th-percentile execution time.
    pub p99_execution_ms: Option<i64>,
}

/// What kind of limit a bottlenecked task type is hitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckKind {
    /// Tasks wait too long for a worker (admission/routing limited).
    Admission,
    /// Tasks take too long once running (execution limited).
    Execution,
}

/// A task type whose latency disproportionately limits throughput.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottleneck {
    /// The offending task type.
    pub task_type: String,
    /// Which limit it is hitting.
    pub kind: BottleneckKind,
    /// The observed rolling mean, in milliseconds.
    pub mean_ms: f64,
    /// The threshold it exceeded, in milliseconds.
    pub threshold_ms: f64,
}

/// Queue status report; `NoData` when no snapshots have been recorded yet.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueueStatus {
    /// No snapshots recorded yet.
    NoData,
    /// Current depth plus trend averages over recent snapshots.
    Ok {
        /// Instantaneous depth from the latest snapshot.
        queue_depth: usize,
        /// Mean depth over the most recent snapshots.
        avg_queue_depth_recent: f64,
        /// Mean queue wait over the most recent snapshots.
        avg_queue_wait_ms: f64,
        /// Mean execution time over the most recent snapshots.
        avg_execution_time_ms: f64,
        /// Mean throughput over the most recent snapshots.
        throughput_tasks_per_minute: f64,
        /// Timestamp of the latest snapshot.
        timestamp: DateTime<Utc>,
    },
}

#[derive(Default)]
struct Inner {
    snapshots: VecDeque<QueueSnapshot>,
    latency: HashMap<String, TaskLatencyRecord>,
    type_stats: HashMap<String, TaskTypeStats>,
}

/// Records queue snapshots and per-task latency, and derives rolling
/// per-task-type statistics and bottleneck flags.
///
/// All statistics are recomputed synchronously when a record is stored, so
/// the next read observes them immediately. Mutations are serialized behind
/// one lock per instance; the clock is injected for testability.
pub struct QueueAnalytics {
    clock: Arc<dyn Clock>,
    inner: Arc<RwLock<Inner>>,
}

impl QueueAnalytics {
    /// Create an analytics instance reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Record a queue snapshot.
    ///
    /// Throughput is derived as the number of latency records completed in
    /// the trailing 60 seconds. History older than 24 hours is pruned.
    pub async fn record_queue_snapshot(
        &self,
        queue_depth: usize,
        executing: usize,
        completed: usize,
        avg_wait_ms: f64,
        avg_execution_ms: f64,
    ) {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;

        let window_start = now - Duration::seconds(THROUGHPUT_WINDOW_SECS);
        let throughput = inner
            .latency
            .values()
            .filter(|r| {
                r.completed_at
                    .is_some_and(|c| c > window_start && c <= now)
            })
            .count();

        inner.snapshots.push_back(QueueSnapshot {
            timestamp: now,
            queue_depth,
            executing,
            completed,
            avg_wait_ms,
            avg_execution_ms,
            throughput_per_minute: throughput,
        });

        let cutoff = now - Duration::hours(SNAPSHOT_RETENTION_HOURS);
        while inner
            .snapshots
            .front()
            .is_some_and(|s| s.timestamp < cutoff)
        {
            inner.snapshots.pop_front();
        }
    }

    /// Store or enrich the latency record for `task_id`.
    ///
    /// `Some` timestamps overwrite, `None` leaves the existing value in
    /// place, so progressive calls can fill the timeline as the task moves
    /// through the queue. Durations are derived only from the pairs present,
    /// and the owning type's rolling statistics are recomputed before the
    /// call returns.
    pub async fn record_task_latency(
        &self,
        task_id: &str,
        task_type: &str,
        worker_id: &str,
        queued_at: Option<DateTime<Utc>>,
        executed_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) {
        let mut inner = self.inner.write().await;

        let record = inner
            .latency
            .entry(task_id.to_string())
            .or_insert_with(|| TaskLatencyRecord {
                task_id: task_id.to_string(),
                task_type: task_type.to_string(),
                worker_id: worker_id.to_string(),
                queued_at: None,
                executed_at: None,
                completed_at: None,
                queue_wait_ms: None,
                execution_ms: None,
                total_ms: None,
            });

        if !worker_id.is_empty() {
            record.worker_id = worker_id.to_string();
        }
        if let Some(q) = queued_at {
            record.queued_at = Some(q);
        }
        if let Some(e) = executed_at {
            record.executed_at = Some(e);
        }
        if let Some(c) = completed_at {
            record.completed_at = Some(c);
        }
        record.recompute_durations();
        let owning_type = record.task_type.clone();

        Self::recompute_type_stats(&mut inner, &owning_type);
        debug!(task = task_id, task_type = %owning_type, "latency recorded");
    }

    fn recompute_type_stats(inner: &mut Inner, task_type: &str) {
        let records: Vec<&TaskLatencyRecord> = inner
            .latency
            .values()
            .filter(|r| r.task_type == task_type)
            .collect();
        if records.is_empty() {
            inner.type_stats.remove(task_type);
            return;
        }

        let mean_of = |values: Vec<i64>| -> f64 {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<i64>() as f64 / values.len() as f64
            }
        };

        let waits: Vec<i64> = records.iter().filter_map(|r| r.queue_wait_ms).collect();
        let mut executions: Vec<i64> =
            records.iter().filter_map(|r| r.execution_ms).collect();
        let totals: Vec<i64> = records.iter().filter_map(|r| r.total_ms).collect();

        executions.sort_unstable();
        let percentile = |sorted: &[i64], q: f64| -> Option<i64> {
            if sorted.is_empty() {
                return None;
            }
            let idx = (q * sorted.len() as f64).floor() as usize;
            sorted.get(idx.min(sorted.len() - 1)).copied()
        };

        let stats = TaskTypeStats {
            count: records.len(),
            mean_queue_wait_ms: mean_of(waits),
            mean_execution_ms: mean_of(executions.clone()),
            mean_total_ms: mean_of(totals),
            p95_execution_ms: percentile(&executions, 0.95),
            p99_execution_ms: percentile(&executions, 0.99),
        };
        inner.type_stats.insert(task_type.to_string(), stats);
    }

    /// The latency record for a task, if one has been stored.
    pub async fn get_task_latency(&self, task_id: &str) -> Option<TaskLatencyRecord> {
        let inner = self.inner.read().await;
        inner.latency.get(task_id).cloned()
    }

    /// Rolling statistics for a task type, if any records exist.
    pub async fn get_type_stats(&self, task_type: &str) -> Option<TaskTypeStats> {
        let inner = self.inner.read().await;
        inner.type_stats.get(task_type).cloned()
    }

    /// Mean queue wait and mean execution time across every latency record,
    /// for callers that need aggregate figures to stamp onto snapshots.
    pub async fn aggregate_means(&self) -> (f64, f64) {
        let inner = self.inner.read().await;
        let waits: Vec<i64> = inner
            .latency
            .values()
            .filter_map(|r| r.queue_wait_ms)
            .collect();
        let executions: Vec<i64> = inner
            .latency
            .values()
            .filter_map(|r| r.execution_ms)
            .collect();
        let mean = |values: &[i64]| -> f64 {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<i64>() as f64 / values.len() as f64
            }
        };
        (mean(&waits), mean(&executions))
    }

    /// Current queue status: `NoData` until the first snapshot, otherwise
    /// the latest depth plus averages over the 10 most recent snapshots.
    pub async fn get_queue_status(&self) -> QueueStatus {
        let inner = self.inner.read().await;
        let Some(latest) = inner.snapshots.back() else {
            return QueueStatus::NoData;
        };

        let recent: Vec<&QueueSnapshot> = inner
            .snapshots
            .iter()
            .rev()
            .take(TREND_SNAPSHOT_COUNT)
            .collect();
        let n = recent.len() as f64;

        QueueStatus::Ok {
            queue_depth: latest.queue_depth,
            avg_queue_depth_recent: recent.iter().map(|s| s.queue_depth as f64).sum::<f64>() / n,
            avg_queue_wait_ms: recent.iter().map(|s| s.avg_wait_ms).sum::<f64>() / n,
            avg_execution_time_ms: recent.iter().map(|s| s.avg_execution_ms).sum::<f64>() / n,
            throughput_tasks_per_minute: recent
                .iter()
                .map(|s| s.throughput_per_minute as f64)
                .sum::<f64>()
                / n,
            timestamp: latest.timestamp,
        }
    }

    /// Flag task types whose rolling means exceed the admission (500 ms
    /// queue wait) or execution (5000 ms) thresholds. Sorted by task type
    /// for stable output; empty when nothing is flagged or no data exists.
    pub async fn identify_bottlenecks(&self) -> Vec<Bottleneck> {
        let inner = self.inner.read().await;
        let mut flagged = Vec::new();
        for (task_type, stats) in &inner.type_stats {
            if stats.mean_queue_wait_ms > QUEUE_WAIT_THRESHOLD_MS {
                flagged.push(Bottleneck {
                    task_type: task_type.clone(),
                    kind: BottleneckKind::Admission,
                    mean_ms: stats.mean_queue_wait_ms,
                    threshold_ms: QUEUE_WAIT_THRESHOLD_MS,
                });
            }
            if stats.mean_execution_ms > EXECUTION_THRESHOLD_MS {
                flagged.push(Bottleneck {
                    task_type: task_type.clone(),
                    kind: BottleneckKind::Execution,
                    mean_ms: stats.mean_execution_ms,
                    threshold_ms: EXECUTION_THRESHOLD_MS,
                });
            }
        }
        flagged.sort_by(|a, b| a.task_type.cmp(&b.task_type));
        flagged
    }
}
