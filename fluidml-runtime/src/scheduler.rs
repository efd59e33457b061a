//! The "Swarm" scheduler: a bounded pool of workers, each holding one
//! exclusive [Resource], pulling ready tasks off a shared ready queue and
//! running them to completion (§4.4, §5).
//!
//! The scheduler's `ready`/`running`/`done` bookkeeping lives entirely in
//! this module's single dispatch loop — per §9's design note ("the
//! scheduler's shared mutable state should be a single owned structure
//! guarded by one lock, or an actor owning it, with workers sending
//! completion messages"), we take the actor shape: the loop itself is
//! the only writer, and workers report back over a channel rather than
//! touching shared state directly. User task code always runs on a
//! `spawn_blocking` thread, outside this loop's critical section.

use crate::{
    channel,
    error::{Error, Result},
    resource_pool::ResourcePool,
    settings::Settings,
    worker::{self, Outcome},
};
use fluidml_core::{store::ResultsStore, Resource};
use fluidml_graph::ExpandedGraph;
use std::{collections::VecDeque, sync::Arc};

/// Drive `graph` to completion: dispatch ready tasks onto a bounded pool
/// of workers, each bound to one [Resource], until every task is done or
/// a fatal failure triggers cancellation (§5).
///
/// Returns [Error::Cancelled] carrying the first fatal error and the
/// names of every task that never started, if any worker fails.
pub(crate) async fn run(
    graph: Arc<ExpandedGraph>,
    resources: Vec<Resource>,
    store: Arc<dyn ResultsStore>,
    settings: &Settings,
) -> Result<()> {
    let worker_count = settings.effective_worker_count(resources.len());
    // §5: "W = count of resources provided, or 1 if none" — with no
    // resources supplied, synthesize exactly one placeholder so the
    // lone worker still has something to acquire from the pool.
    let resources = if resources.is_empty() {
        vec![Resource::unbound()]
    } else {
        resources
    };
    let mut resource_pool = ResourcePool::new(resources);

    let mut ready: VecDeque<usize> = graph.roots().into_iter().collect();
    let mut running: Vec<bool> = vec![false; graph.len()];
    let mut done: Vec<bool> = vec![false; graph.len()];
    let mut in_flight: usize = 0;
    let mut first_failure: Option<fluidml_core::Error> = None;

    let (tx, mut rx) = channel::bounded::<Outcome>(worker_count.max(1));

    let mut refresh = settings.refresh_every().map(tokio::time::interval);
    if let Some(interval) = refresh.as_mut() {
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    }

    loop {
        while first_failure.is_none() && in_flight < worker_count && !ready.is_empty() {
            let Some(resource) = resource_pool.acquire() else {
                break;
            };
            let id = ready.pop_front().expect("checked non-empty above");
            running[id] = true;
            in_flight += 1;

            let task = graph.get(id).expect("ready id is always valid").clone();
            let store = store.clone();
            let graph = graph.clone();
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || {
                let outcome = worker::dispatch(&task, resource, &store, &graph);
                let _ = tx.blocking_send(outcome);
            });
        }

        if in_flight == 0 {
            break;
        }

        tokio::select! {
            biased;
            Some(outcome) = rx.recv() => {
                in_flight -= 1;
                match outcome {
                    Outcome::Completed { id, resource } => {
                        running[id] = false;
                        done[id] = true;
                        resource_pool.release(resource);
                        promote_successors(&graph, id, &done, &running, &mut ready);
                    }
                    Outcome::Failed { id, resource, error } => {
                        running[id] = false;
                        resource_pool.release(resource);
                        if first_failure.is_none() {
                            first_failure = Some(error);
                        }
                    }
                }
            }
            _ = tick_or_pending(refresh.as_mut()) => {
                tracing::info!(
                    done = done.iter().filter(|d| **d).count(),
                    running = in_flight,
                    ready = ready.len(),
                    total = graph.len(),
                    "progress"
                );
            }
        }
    }

    if let Some(error) = first_failure {
        let unreached: Vec<String> = graph
            .tasks()
            .iter()
            .filter(|task| !done[task.id()])
            .map(|task| format!("{}#{}", task.name(), task.id()))
            .collect();
        return Err(Error::Cancelled {
            source: error,
            unreached,
        });
    }

    Ok(())
}

/// Await the next refresh tick, or never resolve if telemetry is
/// disabled — keeping the `select!` arm uniform either way.
async fn tick_or_pending(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Promote every successor of a just-completed task whose predecessors
/// are now all done, in ascending task-id order so ties within one
/// promotion batch resolve deterministically (§4.4's FIFO-by-id rule).
fn promote_successors(
    graph: &ExpandedGraph,
    completed_id: usize,
    done: &[bool],
    running: &[bool],
    ready: &mut VecDeque<usize>,
) {
    let completed = graph.get(completed_id).expect("completed id is always valid");
    let mut newly_ready: Vec<usize> = completed
        .successors()
        .iter()
        .copied()
        .filter(|&successor_id| {
            !done[successor_id]
                && !running[successor_id]
                && !ready.contains(&successor_id)
                && graph
                    .get(successor_id)
                    .expect("successor id is always valid")
                    .predecessors()
                    .iter()
                    .all(|&predecessor_id| done[predecessor_id])
        })
        .collect();
    newly_ready.sort_unstable();
    ready.extend(newly_ready);
}
