//! [TaskSpec]: the declarative template for one graph node, prior to
//! parameter expansion.

use crate::{
    config::{ConfigValue, Expand},
    node::Node,
    task::Task,
};
use indexmap::IndexMap;
use std::{fmt, sync::Arc};

/// Constructs a [Task] instance from one concrete parameter combination.
/// Stands in for the source's `task_class` constructor: expansion calls
/// this once per expanded task, after the Cartesian product / zip has
/// resolved `config` down to a single `kwargs` map.
pub type TaskFactory = Arc<dyn Fn(&IndexMap<String, serde_json::Value>) -> Arc<dyn Task> + Send + Sync>;

/// A declarative template for one graph node. Specs are built by the
/// caller before `Flow::run` and are immutable during execution;
/// `requires` edges are declared on specs, never on expanded tasks (the
/// expander derives expanded-task edges from them).
#[derive(Clone)]
pub struct TaskSpec {
    name: String,
    factory: TaskFactory,
    config: IndexMap<String, ConfigValue>,
    expand: Expand,
    reduce: bool,
    publishes: Option<Vec<String>>,
    node: Node<String>,
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("expand", &self.expand)
            .field("reduce", &self.reduce)
            .field("publishes", &self.publishes)
            .field("predecessors", &self.node.predecessors())
            .finish_non_exhaustive()
    }
}

impl TaskSpec {
    /// Create a new spec. `name` defaults to whatever the caller passes
    /// (the source type's class name); it is used as the store
    /// namespace, so two specs sharing a name should be intentional
    /// aliases, not a collision.
    pub fn new(name: impl Into<String>, factory: TaskFactory) -> Self {
        Self {
            name: name.into(),
            factory,
            config: IndexMap::new(),
            expand: Expand::None,
            reduce: false,
            publishes: None,
            node: Node::new(),
        }
    }

    /// Set a config parameter. Passing a [ConfigValue::List] makes this
    /// key an expansion axis, unless `expand` is [Expand::None].
    pub fn with_config(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Set the expansion strategy (`none` by default).
    pub fn with_expand(mut self, expand: Expand) -> Self {
        self.expand = expand;
        self
    }

    /// Mark this spec as a reduce (fan-in aggregation) node.
    pub fn with_reduce(mut self, reduce: bool) -> Self {
        self.reduce = reduce;
        self
    }

    /// Declare the artifact names this task commits, used by the store
    /// to determine run completeness.
    pub fn with_publishes(mut self, publishes: Vec<String>) -> Self {
        self.publishes = Some(publishes);
        self
    }

    /// Append predecessor(s) to this spec and register `self` as a
    /// successor on each. Duplicate edges are idempotent.
    pub fn requires(&mut self, predecessors: impl IntoIterator<Item = TaskSpecRef>) {
        for predecessor in predecessors {
            self.node.add_predecessor(predecessor.name.clone());
        }
    }

    /// This spec's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This spec's task factory.
    pub fn factory(&self) -> &TaskFactory {
        &self.factory
    }

    /// This spec's config map.
    pub fn config(&self) -> &IndexMap<String, ConfigValue> {
        &self.config
    }

    /// This spec's expansion strategy.
    pub fn expand(&self) -> Expand {
        self.expand
    }

    /// Whether this spec is a reduce node.
    pub fn reduce(&self) -> bool {
        self.reduce
    }

    /// This spec's declared published artifact names, if any.
    pub fn publishes(&self) -> Option<&[String]> {
        self.publishes.as_deref()
    }

    /// Names of specs this spec depends on.
    pub fn predecessor_names(&self) -> &[String] {
        self.node.predecessors()
    }

    /// Names of specs that depend on this spec. Populated by
    /// [TaskSpec::link_successors], not by `requires` itself: unlike the
    /// source's mutable object graph, Rust specs are usually built one
    /// at a time and don't all exist yet when `requires` is called.
    pub fn successor_names(&self) -> &[String] {
        self.node.successors()
    }

    /// A lightweight reference to this spec, usable in `requires` calls.
    pub fn as_ref(&self) -> TaskSpecRef {
        TaskSpecRef {
            name: self.name.clone(),
        }
    }

    /// Populate every spec's successor edges from the full set's
    /// declared predecessor edges. Call once after all specs in a graph
    /// have been built and linked via `requires`.
    pub fn link_successors(specs: &mut [TaskSpec]) {
        let edges: Vec<(String, Vec<String>)> = specs
            .iter()
            .map(|spec| (spec.name.clone(), spec.predecessor_names().to_vec()))
            .collect();
        for (successor_name, predecessor_names) in &edges {
            for predecessor_name in predecessor_names {
                if let Some(predecessor) =
                    specs.iter_mut().find(|spec| &spec.name == predecessor_name)
                {
                    predecessor.node.add_successor(successor_name.clone());
                }
            }
        }
        tracing::debug!(specs = specs.len(), "linked spec successor edges");
    }
}

/// A lightweight handle naming a [TaskSpec], used when declaring
/// `requires` edges without borrowing the spec itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSpecRef {
    name: String,
}

impl TaskSpecRef {
    /// The referenced spec's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&TaskSpec> for TaskSpecRef {
    fn from(spec: &TaskSpec) -> Self {
        spec.as_ref()
    }
}
