//! Core types and error definitions for the Foreman scheduler.
//!
//! This crate provides the foundational pieces shared across all Foreman
//! crates: the unified error type and the clock abstraction used by every
//! time-dependent component.
//!
//! # Main types
//!
//! - [`ForemanError`] — Unified error enum for all Foreman subsystems.
//! - [`ForemanResult`] — Convenience alias for `Result<T, ForemanError>`.
//! - [`Clock`] — Injectable time source (see [`clock`]).

/// Injectable time sources for components that read the wall clock.
pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

// --- Error types ---

/// Top-level error type for the Foreman scheduler.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum ForemanError {
    /// An error building or querying the task dependency graph.
    #[error("Graph error: {0}")]
    Graph(String),

    /// The task specification contains a dependency cycle.
    ///
    /// Carries the ids of every task that could not be placed into a valid
    /// execution order. The set is not necessarily a minimal cycle: tasks
    /// downstream of the cycle are included because they can never become
    /// ready either.
    #[error("dependency cycle detected; unresolved tasks: {unresolved:?}")]
    CycleDetected {
        /// Sorted ids of the tasks left unordered by topological sorting.
        unresolved: Vec<String>,
    },

    /// An error from the queue analytics subsystem.
    #[error("Analytics error: {0}")]
    Analytics(String),

    /// An error from the degradation controller.
    #[error("Degradation error: {0}")]
    Degradation(String),

    /// An error from a bot recommendation provider.
    #[error("Recommendation error: {0}")]
    Recommendation(String),

    /// An error persisting or loading task files.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the orchestrator engine.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ForemanError`].
pub type ForemanResult<T> = Result<T, ForemanError>;
