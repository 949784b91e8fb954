//! Scheduling and backpressure core for a pool of autonomous worker agents.
//!
//! Turns a declarative set of tasks-with-dependencies into a safe execution
//! order, tracks per-task latency and aggregate performance signals, and
//! converts resource/health signals into admission-control decisions that
//! throttle which capabilities stay active. A thin [`Orchestrator`] engine
//! composes the three cores with the external collaborators (worker
//! recommendation, task-file persistence, audit sink).
//!
//! # Main types
//!
//! - [`TaskGraph`] — Dependency DAG with a deterministic execution order.
//! - [`QueueAnalytics`] — Queue snapshots, per-task latency, rolling
//!   per-type statistics with percentiles, bottleneck flags.
//! - [`DegradationController`] — Full/Degraded/Maintenance mode machine,
//!   feature-enablement policy, fallback worker selection.
//! - [`Orchestrator`] — Composition root driving tick/complete cycles.
//! - [`BotRecommender`] — Worker recommendation provider contract.
//! - [`MaintenanceScheduler`] — Cron-driven maintenance windows.

/// Queue snapshots, latency records, and rolling statistics.
pub mod analytics;
/// Operating-mode state machine and feature-enablement policy.
pub mod degradation;
/// Orchestration engine composing the cores with collaborators.
pub mod engine;
/// Cron-driven maintenance windows.
pub mod maintenance;
/// Worker recommendation provider contract and default implementation.
pub mod recommend;
/// Dependency DAG construction and lifecycle transitions.
pub mod task_graph;
/// Shared scheduling types (tasks, specifications, workers).
pub mod types;

pub use analytics::{
    Bottleneck, BottleneckKind, QueueAnalytics, QueueSnapshot, QueueStatus, TaskLatencyRecord,
    TaskTypeStats,
};
pub use degradation::{
    BotPoolStatus, Criticality, DegradationCause, DegradationController, DegradationMode,
    DegradationStatus, FeatureStatus, FEATURES,
};
pub use engine::{GraphProgress, Orchestrator};
pub use maintenance::{MaintenanceScheduler, MaintenanceWindow};
pub use recommend::{BotRecommender, HistoryRecommender};
pub use task_graph::TaskGraph;
pub use types::{
    Assignment, BotHealth, BotRecommendation, ExecutionRecord, Priority, TaskNode, TaskSpec,
    TaskSpecEntry, TaskStatus,
};
