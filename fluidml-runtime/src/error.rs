//! Runtime-level error: the §7 error kinds defined by [fluidml_core::Error]
//! plus the cancellation summary `Flow::run` surfaces after a drain.

/// Errors raised while driving a [Flow](crate::flow::Flow) to completion.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// One of the construction-time or runtime error kinds defined by
    /// the core data model (`CycleDetected`, `InvalidExpansionAxis`,
    /// `DuplicatePredecessorKey`, `MissingPredecessorArtifact`,
    /// `StoreUnavailable`, `TaskFailed`).
    #[error(transparent)]
    Core(#[from] fluidml_core::Error),

    /// A worker failed fatally; the scheduler cancelled dispatch and
    /// drained in-flight workers per §5. Carries the first failure and
    /// the names of tasks that never started.
    #[error("{source}; cancelled with {} task(s) unreached: {}", unreached.len(), unreached.join(", "))]
    Cancelled {
        /// The first fatal error observed.
        #[source]
        source: fluidml_core::Error,
        /// `"name#id"` labels of expanded tasks that were never
        /// dispatched because of the cancellation.
        unreached: Vec<String>,
    },
}

/// Convenience alias for fallible runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
