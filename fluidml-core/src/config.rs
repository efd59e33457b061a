//! Configuration values, expansion axes, and the canonicalized
//! [UniqueConfig] memoization key.
//!
//! [UniqueConfig]: UniqueConfig

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// One entry in a [TaskSpec]'s `config` map: either a fixed scalar or a
/// list of candidate values along an expansion axis.
///
/// [TaskSpec]: crate::spec::TaskSpec
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// A single, non-expanding value.
    Scalar(serde_json::Value),
    /// A list of candidate values; an expansion axis unless `expand` is
    /// `none`, in which case it is passed through verbatim.
    List(Vec<serde_json::Value>),
}

impl ConfigValue {
    /// Construct a scalar from any serializable value.
    pub fn scalar<T: Serialize>(value: T) -> serde_json::Result<Self> {
        Ok(Self::Scalar(serde_json::to_value(value)?))
    }

    /// Construct a list from any serializable values.
    pub fn list<T: Serialize>(values: Vec<T>) -> serde_json::Result<Self> {
        Ok(Self::List(
            values
                .into_iter()
                .map(serde_json::to_value)
                .collect::<serde_json::Result<Vec<_>>>()?,
        ))
    }

    /// Whether this entry is a candidate-list (potential expansion axis).
    pub fn is_list(&self) -> bool {
        matches!(self, ConfigValue::List(_))
    }
}

/// The expansion strategy declared on a [TaskSpec].
///
/// [TaskSpec]: crate::spec::TaskSpec
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expand {
    /// List-valued config entries are passed through verbatim; no
    /// expansion axes.
    #[default]
    None,
    /// Cartesian product of all list-valued axes.
    Product,
    /// Zip all list-valued axes together; they must share a length.
    Zip,
}

/// A single concrete parameter combination produced by expansion: never
/// contains a list along an expansion axis (fixed keys and `none`-mode
/// lists are passed through as-is).
pub type Kwargs = IndexMap<String, serde_json::Value>;

/// The canonical, content-addressable memoization key for an expanded
/// task: `{ predecessor_name: predecessor.unique_config, ...,
/// self.name: self.kwargs }`.
///
/// Canonicalization sorts map keys lexicographically and keeps numeric
/// types and list order exactly as the user supplied them, so that
/// structural equality of two [UniqueConfig]s implies identical
/// canonical bytes (property 2 in the spec's invariants).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueConfig(serde_json::Value);

impl UniqueConfig {
    /// Wrap a raw JSON value as a [UniqueConfig]. The caller is
    /// responsible for having built it with sorted keys (see
    /// [UniqueConfig::merge]).
    pub fn new(value: serde_json::Value) -> Self {
        Self(canonicalize(value))
    }

    /// Build a [UniqueConfig] for an expanded task given its own
    /// `kwargs` under `self_name` and the already-canonical configs of
    /// its predecessors keyed by predecessor spec name.
    pub fn merge(self_name: &str, kwargs: &Kwargs, predecessors: &[(&str, &UniqueConfig)]) -> Self {
        let mut map = serde_json::Map::new();
        for (name, cfg) in predecessors {
            map.insert((*name).to_string(), cfg.0.clone());
        }
        let kwargs_value =
            serde_json::to_value(kwargs).expect("Kwargs is a map of already-valid JSON values");
        map.insert(self_name.to_string(), kwargs_value);
        Self(canonicalize(serde_json::Value::Object(map)))
    }

    /// Borrow the underlying canonical JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Serialize to canonical bytes: sorted-key JSON, no whitespace.
    /// Two [UniqueConfig]s that are structurally equal always produce
    /// identical bytes.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.0).expect("UniqueConfig always serializes")
    }

    /// A stable, short, filesystem-safe content hash of the canonical
    /// bytes, suitable for use as a run directory name.
    pub fn content_hash(&self) -> String {
        let digest = Sha256::digest(self.canonical_bytes());
        hex_encode(&digest)
    }

    /// This config's underlying object with `key` removed, or a clone of
    /// the value unchanged if it isn't an object. Used by reduce
    /// expansion to compute the ancestor-only portion of a sibling's
    /// config shared across a fan-in equivalence class.
    pub fn without_key(&self, key: &str) -> serde_json::Value {
        match &self.0 {
            serde_json::Value::Object(map) => {
                let mut trimmed = map.clone();
                trimmed.remove(key);
                serde_json::Value::Object(trimmed)
            }
            other => other.clone(),
        }
    }

    /// Build a [UniqueConfig] from an ancestor-only base object (as
    /// produced by [UniqueConfig::without_key]) plus `self_name`'s own
    /// `kwargs`.
    pub fn merge_with_base(base: serde_json::Value, self_name: &str, kwargs: &Kwargs) -> Self {
        let mut map = match base {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let kwargs_value =
            serde_json::to_value(kwargs).expect("Kwargs is a map of already-valid JSON values");
        map.insert(self_name.to_string(), kwargs_value);
        Self(canonicalize(serde_json::Value::Object(map)))
    }
}

impl fmt::Display for UniqueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recursively sort object keys so that structurally-equal JSON values
/// serialize to identical bytes regardless of construction order.
/// Lists retain user order per the spec's canonicalization rule.
fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: Vec<(String, serde_json::Value)> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(canonicalize).collect())
        }
        scalar => scalar,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
