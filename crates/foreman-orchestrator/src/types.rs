use serde::{Deserialize, Serialize};

/// Priority label attached to a task by the specification author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work.
    Low,
    /// Normal work.
    #[default]
    Medium,
    /// Urgent work.
    High,
    /// Drop-everything work.
    Critical,
}

/// Lifecycle status of a task in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting on at least one incomplete dependency.
    Pending,
    /// All dependencies complete; eligible for assignment.
    Ready,
    /// Assigned to a worker and executing.
    InProgress,
    /// Finished successfully. Terminal.
    Complete,
    /// Given up on (failure, timeout, operator decision). Terminal.
    Blocked,
}

impl TaskStatus {
    /// Terminal statuses persist for audit and never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Blocked)
    }

    /// Whether the status machine permits moving from `self` to `next`.
    ///
    /// The table is deliberately strict about entry into `InProgress` (only
    /// from Pending/Ready) but lets completion and blocking arrive from any
    /// non-terminal state, because completion callbacks and external timeout
    /// policies do not always observe an explicit in-progress mark first.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, InProgress)
                | (Ready, InProgress)
                | (Pending, Complete)
                | (Ready, Complete)
                | (InProgress, Complete)
                | (Pending, Blocked)
                | (Ready, Blocked)
                | (InProgress, Blocked)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Ready => "ready",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Complete => "complete",
            TaskStatus::Blocked => "blocked",
        };
        write!(f, "{label}")
    }
}

/// One task entry in an incoming specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpecEntry {
    /// Caller-supplied unique identifier.
    pub task_id: String,
    /// Human-readable title.
    pub title: String,
    /// Free-form category string; doubles as the task type for analytics
    /// and worker recommendation.
    pub intent: String,
    /// Short description of the work.
    #[serde(default)]
    pub summary: String,
    /// Ids of tasks that must complete before this one may start.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Preferred worker, if the author pinned one.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Files this task touches.
    #[serde(default)]
    pub files: Vec<String>,
    /// Priority label.
    #[serde(default)]
    pub priority: Priority,
}

/// A declarative set of tasks with dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Identifier of the specification.
    pub spec_id: String,
    /// Title of the specification.
    pub title: String,
    /// The tasks to schedule.
    pub tasks: Vec<TaskSpecEntry>,
}

/// A task node inside a built [`crate::task_graph::TaskGraph`].
///
/// Created when a specification is parsed; mutated only through the graph's
/// status-transition operations; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    /// Unique task id.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Free-form category / task type.
    pub intent: String,
    /// Short description of the work.
    pub summary: String,
    /// Ids this task waits on.
    pub depends_on: Vec<String>,
    /// Preferred worker, if pinned.
    pub assignee: Option<String>,
    /// Files this task touches.
    pub files: Vec<String>,
    /// Priority label.
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: TaskStatus,
}

impl TaskNode {
    /// Build a node from a specification entry. Zero-dependency nodes start
    /// `Ready`, everything else starts `Pending`.
    pub fn from_entry(entry: &TaskSpecEntry) -> Self {
        let status = if entry.depends_on.is_empty() {
            TaskStatus::Ready
        } else {
            TaskStatus::Pending
        };
        Self {
            id: entry.task_id.clone(),
            title: entry.title.clone(),
            intent: entry.intent.clone(),
            summary: entry.summary.clone(),
            depends_on: entry.depends_on.clone(),
            assignee: entry.assignee.clone(),
            files: entry.files.clone(),
            priority: entry.priority,
            status,
        }
    }
}

/// Point-in-time health of a worker bot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BotHealth {
    /// Fraction of recent executions that succeeded, in `[0, 1]`.
    pub success_rate: f64,
    /// Current CPU load of the bot, in `[0, 1]`.
    pub cpu_fraction: f64,
}

/// One historical execution, fed to the recommendation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// The bot that executed the task.
    pub bot_id: String,
    /// The task type that was executed.
    pub task_type: String,
    /// How long execution took.
    pub execution_time_ms: u64,
    /// Whether the execution succeeded.
    pub success: bool,
}

/// Response of a bot-recommendation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRecommendation {
    /// The task type the recommendation is for.
    pub task_type: String,
    /// The preferred bot, if any history supports a preference.
    pub recommended_bot: Option<String>,
    /// Confidence in the recommendation, in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable justification.
    pub reason: String,
    /// Other viable bots, best first, excluding the recommended one.
    pub alternatives: Vec<String>,
}

/// A scheduling decision produced by one orchestrator tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// The task being dispatched.
    pub task_id: String,
    /// The worker it was dispatched to.
    pub bot_id: String,
    /// Recommendation confidence (0 when the recommender was bypassed).
    pub confidence: f64,
    /// True when the preferred bot was unavailable and fallback selection
    /// chose the worker instead.
    pub fallback: bool,
    /// Why this worker was chosen.
    pub reason: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

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

    #[test]
    fn node_from_entry_sets_initial_status() {
        let root = TaskNode::from_entry(&entry("a", &[]));
        assert_eq!(root.status, TaskStatus::Ready);

        let child = TaskNode::from_entry(&entry("b", &["a"]));
        assert_eq!(child.status, TaskStatus::Pending);
    }

    #[test]
    fn terminal_statuses_reject_every_transition() {
        for next in [
            TaskStatus::Pending,
            TaskStatus::Ready,
            TaskStatus::InProgress,
            TaskStatus::Complete,
            TaskStatus::Blocked,
        ] {
            assert!(!TaskStatus::Complete.can_transition_to(next));
            assert!(!TaskStatus::Blocked.can_transition_to(next));
        }
    }

    #[test]
    fn in_progress_only_from_pending_or_ready() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Ready.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn completion_allowed_without_in_progress_mark() {
        assert!(TaskStatus::Ready.can_transition_to(TaskStatus::Complete));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Complete));
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let json = serde_json::json!({
            "spec_id": "rel-1",
            "title": "Release pipeline",
            "tasks": [
                {"task_id": "compile", "title": "Compile", "intent": "build"},
                {"task_id": "test", "title": "Test", "intent": "verify",
                 "depends_on": ["compile"], "priority": "high"}
            ]
        });
        let spec: TaskSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.tasks.len(), 2);
        assert!(spec.tasks[0].depends_on.is_empty());
        assert_eq!(spec.tasks[0].priority, Priority::Medium);
        assert_eq!(spec.tasks[1].priority, Priority::High);
    }

    #[test]
    fn status_serialization_uses_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: TaskStatus = serde_json::from_str("\"blocked\"").unwrap();
        assert_eq!(parsed, TaskStatus::Blocked);
    }
}
