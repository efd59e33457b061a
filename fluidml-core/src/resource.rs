//! [Resource] value object bound to a worker for the duration of one
//! task.
//!
//! [Resource]: Resource

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque resource handle, e.g. `{"device": "cuda:0"}`. The pool owns
/// a fixed list of these; the scheduler guarantees at most one worker
/// holds a given [Resource] at a time.
///
/// Note: does not derive `Hash` — the underlying `serde_json::Value` can
/// hold floats, which aren't hashable. Identify a `Resource` by its
/// canonical string form (`to_string()`) wherever a hashable key is
/// needed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(serde_json::Value);

impl Resource {
    /// Wrap any serializable value as a [Resource] handle.
    pub fn new<T: Serialize>(value: T) -> serde_json::Result<Self> {
        Ok(Self(serde_json::to_value(value)?))
    }

    /// Convenience constructor for the common `{"device": name}` shape.
    pub fn device(name: impl Into<String>) -> Self {
        Self(serde_json::json!({ "device": name.into() }))
    }

    /// A placeholder resource for the single-worker case where the
    /// caller provides none (§5: "`W` = count of resources provided, or
    /// 1 if none"). Carries no meaningful payload; user tasks that
    /// inspect `ctx.resource()` in this mode should not rely on its
    /// shape.
    pub fn unbound() -> Self {
        Self(serde_json::Value::Null)
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
