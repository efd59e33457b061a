//! [LocalFileStore]: the reference filesystem-backed
//! [ResultsStore](fluidml_core::ResultsStore), per §6's "Local file store
//! layout".

use fluidml_core::{
    store::{StoreContext, StoreError, StoreResult, TypeRegistry},
    ResultsStore, UniqueConfig,
};
use indexmap::IndexMap;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A filesystem-backed [ResultsStore]. Artifacts for
/// `(task_name, unique_config, artifact_name)` live under
/// `<base_dir>/<project>/<task_name>/<run_id>/<name>.<ext>`, where
/// `run_id` is `unique_config`'s content hash — deterministic, so two
/// runs over the same spec graph address the same directory without a
/// directory scan. A `config.json` sidecar holding `unique_config`
/// verbatim is written alongside the artifacts so the raw config stays
/// debuggable even once its hash is opaque (§9's design note).
///
/// `save` is atomic from readers' standpoint: bytes are written to a
/// sibling `.tmp` file and renamed into place (§5), so a concurrent
/// `load` never observes a partially written artifact.
#[derive(Debug)]
pub struct LocalFileStore {
    base_dir: PathBuf,
    project: String,
    registry: TypeRegistry,
}

impl LocalFileStore {
    /// Create a store rooted at `base_dir`, namespacing every run under
    /// `project`, with the built-in `json`/`pickle` type handlers
    /// registered.
    pub fn new(base_dir: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            project: project.into(),
            registry: TypeRegistry::with_builtins(),
        }
    }

    /// Register an additional type handler (e.g. a `"torch"` or
    /// `"tokenizer"` token), overriding any existing handler for that
    /// token.
    pub fn with_type(mut self, token: impl Into<String>, handler: fluidml_core::store::TypeHandler) -> Self {
        self.registry.register(token, handler);
        self
    }

    fn run_dir(&self, task_name: &str, unique_config: &UniqueConfig) -> PathBuf {
        self.base_dir
            .join(&self.project)
            .join(task_name)
            .join(unique_config.content_hash())
    }

    fn task_dir(&self, task_name: &str) -> PathBuf {
        self.base_dir.join(&self.project).join(task_name)
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension(format!(
            "{}.tmp",
            path.extension().and_then(|e| e.to_str()).unwrap_or("bin")
        ));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)
    }

    fn write_sidecar(&self, dir: &Path, unique_config: &UniqueConfig) -> StoreResult<()> {
        let sidecar = dir.join("config.json");
        if sidecar.exists() {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(unique_config.as_value())
            .map_err(|e| StoreError::Encode {
                name: "config.json".to_string(),
                type_: "json".to_string(),
                source: e.into(),
            })?;
        Self::write_atomic(&sidecar, &bytes)?;
        Ok(())
    }

    /// Find the artifact file for `name` under `dir`, regardless of
    /// which registered extension it was saved with.
    fn find_artifact(&self, dir: &Path, name: &str) -> Option<(PathBuf, &'static str)> {
        for (_, handler) in self.registry.iter() {
            let candidate = dir.join(format!("{name}.{}", handler.extension));
            if candidate.exists() {
                return Some((candidate, handler.extension));
            }
        }
        None
    }
}

impl ResultsStore for LocalFileStore {
    fn save(
        &self,
        obj: &serde_json::Value,
        name: &str,
        type_: &str,
        task_name: &str,
        task_unique_config: &UniqueConfig,
    ) -> StoreResult<()> {
        let handler = self.registry.get(type_)?;
        let dir = self.run_dir(task_name, task_unique_config);
        fs::create_dir_all(&dir)?;
        self.write_sidecar(&dir, task_unique_config)?;
        let bytes = handler.encode(obj).map_err(|source| StoreError::Encode {
            name: name.to_string(),
            type_: type_.to_string(),
            source,
        })?;
        let path = dir.join(format!("{name}.{}", handler.extension));
        Self::write_atomic(&path, &bytes)?;
        Ok(())
    }

    fn load(
        &self,
        name: &str,
        task_name: &str,
        task_unique_config: &UniqueConfig,
    ) -> StoreResult<Option<serde_json::Value>> {
        let dir = self.run_dir(task_name, task_unique_config);
        let Some((path, _ext)) = self.find_artifact(&dir, name) else {
            return Ok(None);
        };
        let bytes = fs::read(&path)?;
        for (_, handler) in self.registry.iter() {
            if path.extension().and_then(|e| e.to_str()) == Some(handler.extension) {
                let value = handler.decode(&bytes).map_err(|source| StoreError::Decode {
                    name: name.to_string(),
                    source,
                })?;
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn delete_run(&self, task_name: &str, task_unique_config: &UniqueConfig) -> StoreResult<()> {
        let dir = self.run_dir(task_name, task_unique_config);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_runs(&self, task_name: &str) -> StoreResult<Vec<UniqueConfig>> {
        let dir = self.task_dir(task_name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut configs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let sidecar = entry.path().join("config.json");
            if let Ok(bytes) = fs::read(&sidecar) {
                if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                    configs.push(UniqueConfig::new(value));
                }
            }
        }
        Ok(configs)
    }

    fn context(&self, task_name: &str, task_unique_config: &UniqueConfig) -> StoreResult<StoreContext> {
        Ok(StoreContext::Path(self.run_dir(task_name, task_unique_config)))
    }

    fn get_results(
        &self,
        task_name: &str,
        task_unique_config: &UniqueConfig,
        task_publishes: &[String],
    ) -> StoreResult<IndexMap<String, Option<serde_json::Value>>> {
        task_publishes
            .iter()
            .map(|name| {
                let loaded = self.load(name, task_name, task_unique_config)?;
                Ok((name.clone(), loaded))
            })
            .collect()
    }
}

impl std::fmt::Display for LocalFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalFileStore({})", self.base_dir.join(&self.project).display())
    }
}
