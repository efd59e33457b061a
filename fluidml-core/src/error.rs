//! Error types for the FluidML core data model.

use crate::config::UniqueConfig;

/// Generic error type for FluidML task-graph construction and execution.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Raised before scheduling starts when the spec graph, or the graph
    /// expansion produces, a cycle.
    #[error("cycle detected in task graph at or after task {0}")]
    CycleDetected(String),
    /// `expand = "zip"` was given axes of unequal length, or a list value
    /// was supplied where `expand = "none"` requires a scalar.
    #[error("invalid expansion axis for task {task}: {reason}")]
    InvalidExpansionAxis {
        /// Name of the spec whose config failed to expand.
        task: String,
        /// Why the axis was rejected.
        reason: String,
    },
    /// Two non-reduce predecessors published the same artifact name,
    /// which `run`'s packed-kwargs signature cannot disambiguate.
    #[error("task {successor} cannot merge predecessor results: key '{key}' is published by more than one predecessor")]
    DuplicatePredecessorKey {
        /// The successor task whose predecessor results collided.
        successor: String,
        /// The artifact name that collided.
        key: String,
    },
    /// A parameter declared by a task's `run` could not be resolved from
    /// the packed predecessor results.
    #[error("task {task} declares parameter '{parameter}' which is not present in any predecessor result")]
    MissingPredecessorArtifact {
        /// The task whose declared parameter went unresolved.
        task: String,
        /// The missing parameter name.
        parameter: String,
    },
    /// A results-store operation failed (I/O, permissions, serialization).
    #[error("results store operation failed for task {task}: {source}")]
    StoreUnavailable {
        /// The task whose store operation failed.
        task: String,
        /// The underlying I/O or (de)serialization error.
        #[source]
        source: anyhow::Error,
    },
    /// A user task's `run` raised while executing.
    #[error("task {task_name} failed with config {unique_config}: {cause}")]
    TaskFailed {
        /// The name of the failed task.
        task_name: String,
        /// The failed task's unique config, for reproduction.
        unique_config: UniqueConfig,
        /// The underlying cause.
        #[source]
        cause: anyhow::Error,
    },
}

/// Convenience alias for fallible operations across the crate.
pub type Result<T> = std::result::Result<T, Error>;
