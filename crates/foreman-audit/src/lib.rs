//! Best-effort structured audit trail for scheduler state changes.
//!
//! Every component mutation (graph transitions, degradation mode changes,
//! scheduling decisions) emits an [`AuditEvent`] through an [`EventSink`].
//! Emission is fire-and-forget: a sink that is slow, full, or broken must
//! never fail or roll back the primary operation.
//!
//! # Main types
//!
//! - [`AuditEvent`] — A single structured audit record.
//! - [`EventSink`] — The sink seam injected into components.
//! - [`AuditLog`] — File-backed sink appending JSONL via a background task.
//! - [`NoopSink`] — Discards everything; the default for tests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// How the audited operation concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// The operation took effect.
    Applied,
    /// The operation was refused (duplicate transition, invalid status move).
    Rejected,
    /// The operation failed with an error.
    Error,
}

/// A single structured audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// When the audited operation ran (caller-supplied clock).
    pub timestamp: DateTime<Utc>,
    /// Unique id of this event.
    pub event_id: Uuid,
    /// Emitting component, e.g. `"task_graph"` or `"degradation"`.
    pub component: String,
    /// The operation performed, e.g. `"mark_complete"`.
    pub action: String,
    /// The task this event concerns, if any.
    pub task_id: Option<String>,
    /// Arbitrary structured payload.
    pub details: serde_json::Value,
    /// How the operation concluded.
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    /// Create an event with an empty payload.
    pub fn new(
        timestamp: DateTime<Utc>,
        component: impl Into<String>,
        action: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            timestamp,
            event_id: Uuid::new_v4(),
            component: component.into(),
            action: action.into(),
            task_id: None,
            details: serde_json::Value::Null,
            outcome,
        }
    }

    /// Attach the task id this event concerns.
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Attach a structured payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// The sink seam injected into every component that audits its mutations.
///
/// Implementations must be infallible at the call site: errors are absorbed
/// inside the sink.
pub trait EventSink: Send + Sync {
    /// Record an event. Must never block on I/O or surface a failure.
    fn emit(&self, event: AuditEvent);
}

/// A sink that discards every event. Default for tests and embedders that
/// bring their own telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: AuditEvent) {}
}

/// Append-only audit log that records scheduler state changes as JSONL.
///
/// Events are handed to a background task over an unbounded channel; the
/// task appends them to `audit.jsonl` under the configured directory. Any
/// failure along the way (directory creation, serialization, write) is
/// swallowed — the audit trail is best effort by contract.
pub struct AuditLog {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl AuditLog {
    /// Create a new audit log writing under `log_dir`.
    ///
    /// Spawns the background appender; must be called from within a tokio
    /// runtime.
    pub fn new(log_dir: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();

        tokio::spawn(async move {
            let _ = tokio::fs::create_dir_all(&log_dir).await;
            let log_file = log_dir.join("audit.jsonl");

            while let Some(event) = rx.recv().await {
                let Ok(line) = serde_json::to_string(&event) else {
                    continue;
                };
                let open = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_file)
                    .await;
                if let Ok(mut file) = open {
                    use tokio::io::AsyncWriteExt;
                    let _ = file.write_all(format!("{line}\n").as_bytes()).await;
                }
            }
        });

        Self { tx }
    }
}

impl EventSink for AuditLog {
    fn emit(&self, event: AuditEvent) {
        debug!(
            component = %event.component,
            action = %event.action,
            outcome = ?event.outcome,
            "audit"
        );
        let _ = self.tx.send(event);
    }
}
