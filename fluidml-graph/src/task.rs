//! [ExpandedTask]: one concrete node of the execution DAG produced by
//! [expansion](crate::expand::expand).

use fluidml_core::{config::Kwargs, TaskSpec, UniqueConfig};

/// A single concrete, schedulable node of the execution DAG. Unlike a
/// [TaskSpec], an `ExpandedTask` carries one resolved `kwargs` map and a
/// fixed set of predecessor/successor ids (indices into the owning
/// [ExpandedGraph](crate::ExpandedGraph)'s task vector).
#[derive(Clone, Debug)]
pub struct ExpandedTask {
    id: usize,
    name: String,
    kwargs: Kwargs,
    unique_config: UniqueConfig,
    predecessors: Vec<usize>,
    successors: Vec<usize>,
    reduce: bool,
    publishes: Vec<String>,
    spec: TaskSpec,
    force: bool,
}

impl ExpandedTask {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: usize,
        kwargs: Kwargs,
        unique_config: UniqueConfig,
        predecessors: Vec<usize>,
        spec: &TaskSpec,
    ) -> Self {
        Self {
            id,
            name: spec.name().to_string(),
            kwargs,
            unique_config,
            predecessors,
            successors: Vec::new(),
            reduce: spec.reduce(),
            publishes: spec.publishes().map(<[String]>::to_vec).unwrap_or_default(),
            spec: spec.clone(),
            force: false,
        }
    }

    /// This task's id: a stable index into its [ExpandedGraph](crate::ExpandedGraph).
    pub fn id(&self) -> usize {
        self.id
    }

    /// The originating spec's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved parameter combination for this instance.
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    /// This task's memoization key.
    pub fn unique_config(&self) -> &UniqueConfig {
        &self.unique_config
    }

    /// Ids of this task's predecessors in the owning graph.
    pub fn predecessors(&self) -> &[usize] {
        &self.predecessors
    }

    /// Ids of this task's successors in the owning graph.
    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    pub(crate) fn successors_mut(&mut self) -> &mut Vec<usize> {
        &mut self.successors
    }

    /// Whether this is a reduce (fan-in aggregation) node.
    pub fn reduce(&self) -> bool {
        self.reduce
    }

    /// The artifact names this task is declared to publish.
    pub fn publishes(&self) -> &[String] {
        &self.publishes
    }

    /// The originating spec, kept so the runtime can build a [Task]
    /// instance and consult `expects`.
    ///
    /// [Task]: fluidml_core::Task
    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    /// Whether this task is forced to re-run regardless of a prior
    /// complete run.
    pub fn force(&self) -> bool {
        self.force
    }

    /// Mark this task forced. Set by the force-cascade pass in
    /// `fluidml-runtime`.
    pub fn set_force(&mut self, force: bool) {
        self.force = force;
    }
}
