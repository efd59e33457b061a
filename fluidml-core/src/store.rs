//! The Results Store contract (§3, §6): persist and load per-task
//! artifacts keyed by `(task_name, unique_config, artifact_name)`, and
//! the type-handler registry that governs how an artifact's canonical
//! [serde_json::Value] is encoded on a persistent backend.

use crate::config::UniqueConfig;
use indexmap::IndexMap;
use std::fmt;

/// Error surfaced by a [ResultsStore] implementation. Lookup failures
/// during the skip/run decision are treated by the caller as "no prior
/// run" (conservative re-run); only genuine I/O or encoding failures
/// should be returned from `save`/`delete_run`.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The requested `type_` token has no registered handler.
    #[error("no type handler registered for token '{0}'")]
    UnknownType(String),
    /// Encoding a value to its on-disk representation failed.
    #[error("failed to encode artifact '{name}' as '{type_}': {source}")]
    Encode {
        /// Artifact name being encoded.
        name: String,
        /// Type token used for encoding.
        type_: String,
        /// Underlying error.
        #[source]
        source: anyhow::Error,
    },
    /// Decoding a value from its on-disk representation failed.
    #[error("failed to decode artifact '{name}': {source}")]
    Decode {
        /// Artifact name being decoded.
        name: String,
        /// Underlying error.
        #[source]
        source: anyhow::Error,
    },
    /// Propagated I/O error from a persistent backend.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Any other backend-specific failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias for [ResultsStore] operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// How to turn a canonical [serde_json::Value] into bytes on a
/// persistent backend, and back. Registered under a string token (e.g.
/// `"json"`, `"pickle"`) so user code can add backend-specific formats
/// without touching the store trait.
pub struct TypeHandler {
    /// File extension used when the backend needs a path (e.g. `"json"`).
    pub extension: &'static str,
    /// Whether this handler needs a real filesystem path (vs. an
    /// in-memory handle) to do its work.
    pub needs_path: bool,
    encode: fn(&serde_json::Value) -> anyhow::Result<Vec<u8>>,
    decode: fn(&[u8]) -> anyhow::Result<serde_json::Value>,
}

impl fmt::Debug for TypeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandler")
            .field("extension", &self.extension)
            .field("needs_path", &self.needs_path)
            .finish()
    }
}

impl TypeHandler {
    /// Build a custom type handler from an encode/decode function pair.
    pub fn new(
        extension: &'static str,
        needs_path: bool,
        encode: fn(&serde_json::Value) -> anyhow::Result<Vec<u8>>,
        decode: fn(&[u8]) -> anyhow::Result<serde_json::Value>,
    ) -> Self {
        Self {
            extension,
            needs_path,
            encode,
            decode,
        }
    }

    /// Encode a value to bytes using this handler.
    pub fn encode(&self, value: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
        (self.encode)(value)
    }

    /// Decode bytes to a value using this handler.
    pub fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        (self.decode)(bytes)
    }
}

/// Registry of [TypeHandler]s keyed by type token. Required built-in
/// tokens are `"json"` and `"pickle"` (the latter implemented with
/// `bincode`, the idiomatic Rust analog for an opaque binary
/// object-serialization format — see `DESIGN.md`).
#[derive(Debug)]
pub struct TypeRegistry(IndexMap<String, TypeHandler>);

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TypeRegistry {
    /// An empty registry with no handlers at all.
    pub fn empty() -> Self {
        Self(IndexMap::new())
    }

    /// A registry pre-populated with the `"json"` and `"pickle"`
    /// built-in tokens.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(
            "json",
            TypeHandler::new(
                "json",
                true,
                |value| Ok(serde_json::to_vec_pretty(value)?),
                |bytes| Ok(serde_json::from_slice(bytes)?),
            ),
        );
        registry.register(
            "pickle",
            TypeHandler::new(
                "pickle",
                true,
                |value| Ok(bincode::serialize(value)?),
                |bytes| Ok(bincode::deserialize(bytes)?),
            ),
        );
        registry
    }

    /// Register (or replace) a handler for `token`.
    pub fn register(&mut self, token: impl Into<String>, handler: TypeHandler) {
        self.0.insert(token.into(), handler);
    }

    /// Look up the handler registered for `token`.
    pub fn get(&self, token: &str) -> StoreResult<&TypeHandler> {
        self.0
            .get(token)
            .ok_or_else(|| StoreError::UnknownType(token.to_string()))
    }

    /// Iterate over every registered `(token, handler)` pair. Used by
    /// backends (e.g. the local filesystem store) that must recover a
    /// handler from an artifact's file extension alone, since
    /// [ResultsStore::load] doesn't carry the `type_` token back.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeHandler)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Store-specific handle returned by [ResultsStore::context], e.g. a
/// dedicated run directory for a filesystem-backed store. User tasks
/// receive this via `get_store_context` when they need direct access to
/// the backend beyond `save`/`load`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreContext {
    /// A filesystem directory dedicated to this task run.
    Path(std::path::PathBuf),
    /// No addressable location (e.g. a pure in-memory store).
    None,
}

/// Duck-typed Results Store contract (§3, §6). Implementations persist
/// artifacts keyed by `(task_name, unique_config, artifact_name)` and
/// must be safe for concurrent `save`/`load` from distinct workers: a
/// `save` for a given key must be atomic from readers' standpoint
/// (write-then-rename or equivalent).
pub trait ResultsStore: Send + Sync + fmt::Debug {
    /// Persist `obj` under `name` for the given task run, encoded with
    /// the handler registered for `type_`.
    fn save(
        &self,
        obj: &serde_json::Value,
        name: &str,
        type_: &str,
        task_name: &str,
        task_unique_config: &UniqueConfig,
    ) -> StoreResult<()>;

    /// Load a previously saved artifact, or `None` if it was never
    /// saved for this task run.
    fn load(
        &self,
        name: &str,
        task_name: &str,
        task_unique_config: &UniqueConfig,
    ) -> StoreResult<Option<serde_json::Value>>;

    /// Load every artifact named in `task_publishes` for a task run.
    /// Missing names yield `None` rather than an error, per §6.
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

    /// Whether a run with all of `task_publishes` already exists (or,
    /// if `task_publishes` is empty, whether any run exists at all)
    /// for `(task_name, task_unique_config)`.
    fn has_complete_run(
        &self,
        task_name: &str,
        task_unique_config: &UniqueConfig,
        task_publishes: &[String],
    ) -> StoreResult<bool> {
        if task_publishes.is_empty() {
            return Ok(self.list_runs(task_name)?.contains(task_unique_config));
        }
        for name in task_publishes {
            if self.load(name, task_name, task_unique_config)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Remove every artifact recorded for a task run.
    fn delete_run(&self, task_name: &str, task_unique_config: &UniqueConfig) -> StoreResult<()>;

    /// List the unique configs of every run recorded for `task_name`.
    fn list_runs(&self, task_name: &str) -> StoreResult<Vec<UniqueConfig>>;

    /// A store-specific handle for direct access beyond `save`/`load`
    /// (e.g. the run's directory on a filesystem-backed store). Defaults
    /// to [StoreContext::None] for stores with no addressable location.
    fn context(
        &self,
        _task_name: &str,
        _task_unique_config: &UniqueConfig,
    ) -> StoreResult<StoreContext> {
        Ok(StoreContext::None)
    }
}
