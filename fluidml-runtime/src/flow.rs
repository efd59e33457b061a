//! [Flow]: the orchestrator. Holds the caller's spec graph, drives
//! expansion, hands the concrete graph to the [Swarm](crate::scheduler)
//! scheduler, and aggregates the store's results into a return bundle
//! (§4.3).

use crate::{error::Result, scheduler, settings::Settings};
use fluidml_core::{store::ResultsStore, Resource, TaskSpec, UniqueConfig};
use fluidml_graph::{ExpandedGraph, ExpandedTask};
use indexmap::IndexMap;
use std::{collections::HashSet, sync::Arc};

/// One caller-supplied force directive, parsed from the `force` syntax
/// accepted by [Flow::run] (§4.5): `None | "all" | "<name>" | "<name>+"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForceDirective {
    /// Force every expanded task, regardless of name.
    All,
    /// Force every expanded instance of the named spec, but not its
    /// successors.
    Task(String),
    /// Force every expanded instance of the named spec, and cascade the
    /// force flag to every transitive successor (the `"<name>+"` form).
    TaskCascade(String),
}

impl From<&str> for ForceDirective {
    fn from(directive: &str) -> Self {
        if directive == "all" {
            ForceDirective::All
        } else if let Some(name) = directive.strip_suffix('+') {
            ForceDirective::TaskCascade(name.to_string())
        } else {
            ForceDirective::Task(directive.to_string())
        }
    }
}

impl From<String> for ForceDirective {
    fn from(directive: String) -> Self {
        ForceDirective::from(directive.as_str())
    }
}

/// One sibling's contribution to a multi-instance task's aggregated
/// result bundle entry.
#[derive(Clone, Debug)]
pub struct ResultRecord {
    /// The sibling's unique config, so a caller can tell instances
    /// apart.
    pub config: UniqueConfig,
    /// The sibling's published artifacts (`None` for any declared name
    /// that was never saved).
    pub result: IndexMap<String, Option<serde_json::Value>>,
}

/// A task's entry in the aggregated result bundle: single-instance task
/// names unwrap to the bare result, multi-instance names become a list
/// of `{config, result}` records (§4.3).
#[derive(Clone, Debug)]
pub enum AggregatedResult {
    /// The spec expanded to exactly one task.
    Single(IndexMap<String, Option<serde_json::Value>>),
    /// The spec expanded to more than one task.
    Many(Vec<ResultRecord>),
}

impl AggregatedResult {
    /// The single result, if this entry has exactly one instance.
    pub fn as_single(&self) -> Option<&IndexMap<String, Option<serde_json::Value>>> {
        match self {
            AggregatedResult::Single(result) => Some(result),
            AggregatedResult::Many(_) => None,
        }
    }

    /// The per-instance records, if this entry has more than one
    /// instance.
    pub fn as_many(&self) -> Option<&[ResultRecord]> {
        match self {
            AggregatedResult::Many(records) => Some(records),
            AggregatedResult::Single(_) => None,
        }
    }
}

/// The aggregated result bundle [Flow::run] returns on success: one
/// entry per distinct task spec name.
pub type ResultBundle = IndexMap<String, AggregatedResult>;

/// The orchestrator. Holds the caller's immutable spec graph; expansion
/// runs fresh on every [Flow::run] call so a `Flow` can be reused across
/// runs with different `force` directives.
#[derive(Debug)]
pub struct Flow {
    specs: Vec<TaskSpec>,
    settings: Settings,
}

impl Flow {
    /// Build a flow from a fully-wired spec graph. Call
    /// [TaskSpec::link_successors] on `specs` beforehand so every spec's
    /// successor edges are populated.
    pub fn new(specs: Vec<TaskSpec>) -> Self {
        Self {
            specs,
            settings: Settings::default(),
        }
    }

    /// Override the default runtime settings (worker count, refresh
    /// interval) for this flow.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Expand the spec graph, schedule it to completion on `resources`,
    /// and return the aggregated result bundle.
    ///
    /// `project_name` is threaded through for tracing context only: the
    /// reference [ResultsStore](fluidml_core::ResultsStore)
    /// implementations namespace runs under a project at construction
    /// time, since the trait itself is agnostic to project scoping (see
    /// `DESIGN.md`).
    pub async fn run(
        &self,
        resources: Vec<Resource>,
        store: Arc<dyn ResultsStore>,
        project_name: impl Into<String>,
        force: Option<Vec<ForceDirective>>,
    ) -> Result<ResultBundle> {
        let project_name = project_name.into();
        let span = tracing::info_span!("flow.run", project = %project_name, specs = self.specs.len());
        let _enter = span.enter();

        let mut graph = fluidml_graph::expand(&self.specs)?;
        apply_force(&mut graph, &force.unwrap_or_default());
        let graph = Arc::new(graph);

        scheduler::run(graph.clone(), resources, store.clone(), &self.settings).await?;

        pack_results(&graph, store.as_ref())
    }
}

/// Normalize the caller's force directives into a per-expanded-task
/// boolean (§4.5): `"<name>+"` cascades forward through successor edges.
fn apply_force(graph: &mut ExpandedGraph, directives: &[ForceDirective]) {
    if directives.is_empty() {
        return;
    }
    let force_all = directives.iter().any(|d| matches!(d, ForceDirective::All));

    let mut forced: HashSet<usize> = HashSet::new();
    let mut cascade_roots: Vec<usize> = Vec::new();

    for task in graph.tasks() {
        if force_all {
            forced.insert(task.id());
            continue;
        }
        for directive in directives {
            match directive {
                ForceDirective::All => {}
                ForceDirective::Task(name) if name == task.name() => {
                    forced.insert(task.id());
                }
                ForceDirective::TaskCascade(name) if name == task.name() => {
                    if forced.insert(task.id()) {
                        cascade_roots.push(task.id());
                    }
                }
                _ => {}
            }
        }
    }

    let mut stack = cascade_roots;
    while let Some(id) = stack.pop() {
        let successors = graph
            .get(id)
            .expect("task id is always valid within its own graph")
            .successors()
            .to_vec();
        for successor_id in successors {
            if forced.insert(successor_id) {
                stack.push(successor_id);
            }
        }
    }

    for task in graph.tasks_mut() {
        if forced.contains(&task.id()) {
            task.set_force(true);
        }
    }
}

/// Build the aggregated result bundle (§4.3): group expanded tasks by
/// spec name and load each one's published artifacts from `store`.
fn pack_results(graph: &ExpandedGraph, store: &dyn ResultsStore) -> Result<ResultBundle> {
    let mut by_name: IndexMap<String, Vec<&ExpandedTask>> = IndexMap::new();
    for task in graph.tasks() {
        by_name.entry(task.name().to_string()).or_default().push(task);
    }

    let mut bundle = ResultBundle::new();
    for (name, tasks) in by_name {
        if let [task] = tasks.as_slice() {
            let result = load_results(store, task)?;
            bundle.insert(name, AggregatedResult::Single(result));
        } else {
            let mut records = Vec::with_capacity(tasks.len());
            for task in tasks {
                records.push(ResultRecord {
                    config: task.unique_config().clone(),
                    result: load_results(store, task)?,
                });
            }
            bundle.insert(name, AggregatedResult::Many(records));
        }
    }
    Ok(bundle)
}

fn load_results(
    store: &dyn ResultsStore,
    task: &ExpandedTask,
) -> Result<IndexMap<String, Option<serde_json::Value>>> {
    store
        .get_results(task.name(), task.unique_config(), task.publishes())
        .map_err(|source| {
            fluidml_core::Error::StoreUnavailable {
                task: task.name().to_string(),
                source: source.into(),
            }
            .into()
        })
}
