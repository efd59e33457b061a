//! [Task]: the per-execution surface a user task sees, and the packed
//! predecessor-results shape the runtime builds before invoking it.

use crate::{
    config::UniqueConfig,
    resource::Resource,
    store::{ResultsStore, StoreContext},
};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, sync::Arc};

/// One sibling's contribution to a reduce task's `reduced_results`: the
/// sibling's own published results, keyed by artifact name, alongside
/// the `unique_config` that produced them.
#[derive(Clone, Debug)]
pub struct ReducedResult {
    /// The sibling's unique config.
    pub config: UniqueConfig,
    /// The sibling's published artifacts (`None` for any name that was
    /// declared but never saved).
    pub result: IndexMap<String, Option<serde_json::Value>>,
}

/// Predecessor results packed for one task invocation, per §4.6.
#[derive(Clone, Debug)]
pub enum PackedResults {
    /// Non-reduce case: predecessor artifact maps merged into one flat
    /// dict. Construction already rejected colliding keys
    /// (`DuplicatePredecessorKey`).
    Flat(IndexMap<String, serde_json::Value>),
    /// Reduce case: one [ReducedResult] per aggregated sibling, passed
    /// under the fixed name `reduced_results`.
    Reduced(Vec<ReducedResult>),
}

impl PackedResults {
    /// An empty flat result set (a task with no predecessors).
    pub fn empty() -> Self {
        Self::Flat(IndexMap::new())
    }

    /// Fetch and deserialize a named artifact from the flat case.
    /// Returns `Ok(None)` if absent, and an error if present but not
    /// deserializable as `T`. Always `Ok(None)` for the reduce case.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> serde_json::Result<Option<T>> {
        match self {
            PackedResults::Flat(map) => map
                .get(name)
                .map(|value| serde_json::from_value(value.clone()))
                .transpose(),
            PackedResults::Reduced(_) => Ok(None),
        }
    }

    /// Whether `name` is present in the flat case.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            PackedResults::Flat(map) => map.contains_key(name),
            PackedResults::Reduced(_) => false,
        }
    }

    /// The aggregated sibling records, for the reduce case.
    pub fn reduced(&self) -> Option<&[ReducedResult]> {
        match self {
            PackedResults::Reduced(records) => Some(records),
            PackedResults::Flat(_) => None,
        }
    }
}

/// The per-execution context injected into a running [Task]: its
/// identity, its bound [Resource], and a results-store handle scoped to
/// this task's own `(name, unique_config)` so `save`/`load` need not
/// repeat them.
pub struct TaskContext {
    name: String,
    unique_config: UniqueConfig,
    resource: Resource,
    store: Arc<dyn ResultsStore>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("name", &self.name)
            .field("unique_config", &self.unique_config)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    /// Build a context for one task invocation.
    pub fn new(
        name: impl Into<String>,
        unique_config: UniqueConfig,
        resource: Resource,
        store: Arc<dyn ResultsStore>,
    ) -> Self {
        Self {
            name: name.into(),
            unique_config,
            resource,
            store,
        }
    }

    /// This task's name (the store namespace).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This task's memoization key.
    pub fn unique_config(&self) -> &UniqueConfig {
        &self.unique_config
    }

    /// The resource this task's worker is bound to for this run.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Save `obj` under `name`, encoded per the `type_` token (`"json"`,
    /// `"pickle"`, or a caller-registered token), scoped to this task's
    /// own `(name, unique_config)`.
    pub fn save<T: Serialize>(
        &self,
        obj: &T,
        name: &str,
        type_: &str,
    ) -> anyhow::Result<()> {
        let value = serde_json::to_value(obj)?;
        self.store
            .save(&value, name, type_, &self.name, &self.unique_config)?;
        Ok(())
    }

    /// Load a previously saved artifact. Defaults to this task's own
    /// identity when `task_name`/`task_unique_config` are omitted, per
    /// §6.
    pub fn load<T: DeserializeOwned>(
        &self,
        name: &str,
        task_name: Option<&str>,
        task_unique_config: Option<&UniqueConfig>,
    ) -> anyhow::Result<Option<T>> {
        let task_name = task_name.unwrap_or(&self.name);
        let unique_config = task_unique_config.unwrap_or(&self.unique_config);
        let loaded = self.store.load(name, task_name, unique_config)?;
        Ok(loaded.map(serde_json::from_value).transpose()?)
    }

    /// A store-specific handle for direct access beyond `save`/`load`.
    pub fn store_context(&self) -> anyhow::Result<StoreContext> {
        Ok(self.store.context(&self.name, &self.unique_config)?)
    }
}

/// Abstract user task. Implementations perform arbitrary synchronous
/// work; the scheduler runs `run` on a blocking thread so it may block
/// freely (see `fluidml-runtime`'s worker).
pub trait Task: Send + Sync {
    /// Run this task's core logic, given its packed predecessor
    /// results. Artifacts are published via `ctx.save`, not a return
    /// value — matching the source's side-effecting `run`.
    fn run(&self, ctx: &TaskContext, inputs: PackedResults) -> anyhow::Result<()>;

    /// Predecessor artifact names this task's `run` requires to be
    /// present after packing. Validated just before dispatch; an unmet
    /// name surfaces as `MissingPredecessorArtifact` rather than a panic
    /// inside `run`. Empty by default (accept whatever predecessors
    /// publish, mirroring the source's `**kwargs` capture).
    fn expects(&self) -> &[&'static str] {
        &[]
    }
}
