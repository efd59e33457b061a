//! Per-task dispatch: the skip/run/force decision (§4.5), predecessor
//! result packing (§4.6), and invoking a user [Task](fluidml_core::Task).
//!
//! A dispatch runs entirely on a blocking thread (via
//! `tokio::task::spawn_blocking` in [crate::scheduler]) since user `run`
//! implementations are synchronous and may block freely; this module
//! itself has no `async` surface.

use fluidml_core::{
    store::ResultsStore,
    task::{PackedResults, ReducedResult},
    Error, Resource, TaskContext,
};
use fluidml_graph::{ExpandedGraph, ExpandedTask};
use indexmap::IndexMap;
use std::sync::Arc;

/// What happened when a single expanded task was dispatched, reported
/// back to the scheduler's dispatch loop over its completion channel.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The task ran (or was skipped) with no fatal error. Carries the
    /// resource back so the scheduler can return it to the free pool.
    Completed { id: usize, resource: Resource },
    /// A fatal error: a predecessor invariant was violated, the store
    /// was unavailable, or the user's `run` raised. Still carries the
    /// resource, since the scheduler reclaims it even on failure (§5).
    Failed {
        id: usize,
        resource: Resource,
        error: Error,
    },
}

/// Dispatch one expanded task: decide skip/run/force, pack predecessor
/// results, and invoke the user task if it isn't skipped.
pub(crate) fn dispatch(
    task: &ExpandedTask,
    resource: Resource,
    store: &Arc<dyn ResultsStore>,
    graph: &ExpandedGraph,
) -> Outcome {
    match dispatch_inner(task, &resource, store, graph) {
        Ok(()) => Outcome::Completed {
            id: task.id(),
            resource,
        },
        Err(error) => Outcome::Failed {
            id: task.id(),
            resource,
            error,
        },
    }
}

fn dispatch_inner(
    task: &ExpandedTask,
    resource: &Resource,
    store: &Arc<dyn ResultsStore>,
    graph: &ExpandedGraph,
) -> Result<(), Error> {
    let packed = pack_predecessor_results(task, store, graph)?;

    let user_task = (task.spec().factory())(task.kwargs());

    if !task.reduce() {
        for parameter in user_task.expects() {
            if !packed.contains(parameter) {
                return Err(Error::MissingPredecessorArtifact {
                    task: task.name().to_string(),
                    parameter: (*parameter).to_string(),
                });
            }
        }
    }

    let should_run = decide(task, store)?;
    if !should_run {
        tracing::debug!(task = task.name(), id = task.id(), "skipping: prior run found");
        return Ok(());
    }

    tracing::debug!(task = task.name(), id = task.id(), forced = task.force(), "running");
    let ctx = TaskContext::new(
        task.name().to_string(),
        task.unique_config().clone(),
        resource.clone(),
        store.clone(),
    );
    user_task.run(&ctx, packed).map_err(|cause| Error::TaskFailed {
        task_name: task.name().to_string(),
        unique_config: task.unique_config().clone(),
        cause,
    })
}

/// §4.5's skip/run/force decision table. Store failures during the
/// lookup itself are treated as "no prior run" (conservative re-run),
/// per §7; an explicit `delete_run` failure under `force`, however, is
/// surfaced as [Error::StoreUnavailable].
fn decide(task: &ExpandedTask, store: &Arc<dyn ResultsStore>) -> Result<bool, Error> {
    if task.force() {
        store
            .delete_run(task.name(), task.unique_config())
            .map_err(|source| Error::StoreUnavailable {
                task: task.name().to_string(),
                source: source.into(),
            })?;
        return Ok(true);
    }
    let has_complete_run = store
        .has_complete_run(task.name(), task.unique_config(), task.publishes())
        .unwrap_or(false);
    Ok(!has_complete_run)
}

/// Pack predecessor results per §4.6: a flat merged dict for a non-
/// reduce task (erroring on a colliding artifact name), or one
/// [ReducedResult] per aggregated sibling for a reduce task.
fn pack_predecessor_results(
    task: &ExpandedTask,
    store: &Arc<dyn ResultsStore>,
    graph: &ExpandedGraph,
) -> Result<PackedResults, Error> {
    if task.reduce() {
        let mut records = Vec::with_capacity(task.predecessors().len());
        for &predecessor_id in task.predecessors() {
            let predecessor = graph
                .get(predecessor_id)
                .expect("predecessor id always resolves within its own graph");
            let result = store
                .get_results(predecessor.name(), predecessor.unique_config(), predecessor.publishes())
                .map_err(|source| Error::StoreUnavailable {
                    task: task.name().to_string(),
                    source: source.into(),
                })?;
            records.push(ReducedResult {
                config: predecessor.unique_config().clone(),
                result,
            });
        }
        return Ok(PackedResults::Reduced(records));
    }

    let mut flat: IndexMap<String, serde_json::Value> = IndexMap::new();
    for &predecessor_id in task.predecessors() {
        let predecessor = graph
            .get(predecessor_id)
            .expect("predecessor id always resolves within its own graph");
        let result = store
            .get_results(predecessor.name(), predecessor.unique_config(), predecessor.publishes())
            .map_err(|source| Error::StoreUnavailable {
                task: task.name().to_string(),
                source: source.into(),
            })?;
        for (name, value) in result {
            let Some(value) = value else { continue };
            if flat.contains_key(&name) {
                return Err(Error::DuplicatePredecessorKey {
                    successor: task.name().to_string(),
                    key: name,
                });
            }
            flat.insert(name, value);
        }
    }
    Ok(PackedResults::Flat(flat))
}
