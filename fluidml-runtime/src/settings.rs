//! Runtime settings, modeled on `homestar-runtime`'s `settings.rs`:
//! a [derive_builder]-generated builder, loadable from a TOML file plus
//! environment overrides via the [config] crate, with defaults that work
//! out of the box.

use config::{Config, ConfigError, Environment, File};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

const ENV_PREFIX: &str = "FLUIDML";

/// Top-level runtime settings: worker-pool sizing, the periodic
/// telemetry refresh (§4.4), and the local filesystem store's base
/// directory.
#[derive(Builder, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[builder(default)]
#[serde(default)]
pub struct Settings {
    /// Override for the worker pool's concurrency cap. Defaults to the
    /// number of resources passed to `Flow::run` when unset (`None`),
    /// per §5 ("`W` = count of resources provided, or 1 if none").
    pub(crate) worker_count: Option<usize>,
    /// How often the scheduler wakes to re-emit progress telemetry.
    /// Purely observational (§4.4): it never changes the ready/running
    /// sets. `None` disables the refresh entirely.
    #[serde(default, with = "humantime_serde_option")]
    pub(crate) refresh_every: Option<Duration>,
    /// Base directory for `fluidml_runtime::store::local::LocalFileStore`.
    pub(crate) store_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            worker_count: None,
            refresh_every: None,
            store_dir: PathBuf::from(".fluidml/store"),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file, layered under
    /// environment variables prefixed `FLUIDML__` (double underscore
    /// separates nesting, e.g. `FLUIDML__WORKER_COUNT=4`), layered over
    /// the struct [Default].
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    /// The configured worker-count override, if any.
    pub fn worker_count(&self) -> Option<usize> {
        self.worker_count
    }

    /// The configured telemetry refresh interval, if any.
    pub fn refresh_every(&self) -> Option<Duration> {
        self.refresh_every
    }

    /// The configured local store base directory.
    pub fn store_dir(&self) -> &std::path::Path {
        &self.store_dir
    }

    /// Resolve the effective worker-pool concurrency: the configured
    /// override, or the number of provided resources (minimum 1).
    pub(crate) fn effective_worker_count(&self, resource_count: usize) -> usize {
        self.worker_count.unwrap_or(resource_count).max(1)
    }
}

/// `humantime`-backed (de)serialization for `Option<Duration>`, since
/// `serde_with`'s `DurationSeconds` (as used by the teacher) doesn't
/// handle the `None` case FluidML's optional refresh interval needs.
mod humantime_serde_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => humantime::format_duration(*duration)
                .to_string()
                .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
