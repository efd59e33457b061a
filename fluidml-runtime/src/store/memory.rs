//! [MemoryStore]: an in-process [ResultsStore](fluidml_core::ResultsStore)
//! backed by `dashmap`, for callers that don't need persistence across
//! process restarts and for this workspace's own tests.

use dashmap::DashMap;
use fluidml_core::{
    store::{StoreContext, StoreResult},
    ResultsStore, UniqueConfig,
};
use indexmap::IndexMap;

type RunKey = (String, String);

/// A concurrent-safe, purely in-memory [ResultsStore]. Artifacts are
/// keyed by `(task_name, unique_config.content_hash())`; `"pickle"` and
/// `"json"` are both stored as the canonical [serde_json::Value] itself,
/// since there's no on-disk representation to round-trip through (§6).
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: DashMap<RunKey, (UniqueConfig, IndexMap<String, serde_json::Value>)>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(task_name: &str, unique_config: &UniqueConfig) -> RunKey {
        (task_name.to_string(), unique_config.content_hash().to_string())
    }
}

impl ResultsStore for MemoryStore {
    fn save(
        &self,
        obj: &serde_json::Value,
        name: &str,
        _type_: &str,
        task_name: &str,
        task_unique_config: &UniqueConfig,
    ) -> StoreResult<()> {
        let key = Self::key(task_name, task_unique_config);
        let mut entry = self
            .runs
            .entry(key)
            .or_insert_with(|| (task_unique_config.clone(), IndexMap::new()));
        entry.1.insert(name.to_string(), obj.clone());
        Ok(())
    }

    fn load(
        &self,
        name: &str,
        task_name: &str,
        task_unique_config: &UniqueConfig,
    ) -> StoreResult<Option<serde_json::Value>> {
        let key = Self::key(task_name, task_unique_config);
        Ok(self
            .runs
            .get(&key)
            .and_then(|entry| entry.1.get(name).cloned()))
    }

    fn delete_run(&self, task_name: &str, task_unique_config: &UniqueConfig) -> StoreResult<()> {
        self.runs.remove(&Self::key(task_name, task_unique_config));
        Ok(())
    }

    fn list_runs(&self, task_name: &str) -> StoreResult<Vec<UniqueConfig>> {
        Ok(self
            .runs
            .iter()
            .filter(|entry| entry.key().0 == task_name)
            .map(|entry| entry.value().0.clone())
            .collect())
    }

    fn context(&self, _task_name: &str, _task_unique_config: &UniqueConfig) -> StoreResult<StoreContext> {
        Ok(StoreContext::None)
    }
}

impl std::fmt::Display for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryStore({} runs)", self.runs.len())
    }
}
