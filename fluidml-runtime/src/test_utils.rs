//! Test doubles shared by this crate's own integration tests and, under
//! the `test-utils` feature, by downstream crates exercising [Flow]
//! against a fast in-memory backend.
//!
//! [Flow]: crate::flow::Flow

pub use crate::store::MemoryStore;

use fluidml_core::{task::PackedResults, Task, TaskContext};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// A [Task] that records how many times its `run` was invoked and
/// delegates the actual work to a caller-supplied closure. Used to
/// assert skip/run/force behavior without a real workload: tests share
/// one [CounterHandle] across a task's every expanded instance and
/// assert on the final count.
pub struct CountingTask<F>
where
    F: Fn(&TaskContext, PackedResults) -> anyhow::Result<()> + Send + Sync,
{
    counter: CounterHandle,
    expects: Vec<&'static str>,
    body: F,
}

impl<F> CountingTask<F>
where
    F: Fn(&TaskContext, PackedResults) -> anyhow::Result<()> + Send + Sync,
{
    /// Build a counting task sharing `counter`, requiring no predecessor
    /// artifacts, running `body` on every (non-skipped) invocation.
    pub fn new(counter: CounterHandle, body: F) -> Self {
        Self {
            counter,
            expects: Vec::new(),
            body,
        }
    }

    /// Declare the predecessor artifact names this task's `expects()`
    /// should report.
    pub fn expecting(mut self, expects: Vec<&'static str>) -> Self {
        self.expects = expects;
        self
    }
}

impl<F> Task for CountingTask<F>
where
    F: Fn(&TaskContext, PackedResults) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&self, ctx: &TaskContext, inputs: PackedResults) -> anyhow::Result<()> {
        self.counter.increment();
        (self.body)(ctx, inputs)
    }

    fn expects(&self) -> &[&'static str] {
        &self.expects
    }
}

/// A shared, cloneable call counter for [CountingTask].
#[derive(Clone, Debug, Default)]
pub struct CounterHandle(Arc<AtomicUsize>);

impl CounterHandle {
    /// A fresh counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// The current call count.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Build a [CountingTask] factory closure suitable for
/// [fluidml_core::spec::TaskSpec::new], publishing nothing and
/// requiring nothing beyond what `expects` declares.
pub fn counting_factory(
    counter: CounterHandle,
    expects: Vec<&'static str>,
) -> fluidml_core::spec::TaskFactory {
    Arc::new(move |_kwargs| {
        let counter = counter.clone();
        let expects = expects.clone();
        Arc::new(CountingTask::new(counter, |_ctx, _inputs| Ok(())).expecting(expects)) as Arc<dyn Task>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluidml_core::{store::ResultsStore, Resource, UniqueConfig};

    #[test]
    fn counting_task_increments_shared_counter() {
        let counter = CounterHandle::new();
        let task = CountingTask::new(counter.clone(), |_ctx, _inputs| Ok(()));
        let store: Arc<dyn ResultsStore> = Arc::new(MemoryStore::new());
        let ctx = TaskContext::new(
            "Noop",
            UniqueConfig::new(serde_json::json!({})),
            Resource::device("cpu:0"),
            store,
        );
        task.run(&ctx, PackedResults::empty()).unwrap();
        task.run(&ctx, PackedResults::empty()).unwrap();
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn memory_store_is_reachable_through_test_utils() {
        let store = MemoryStore::new();
        let config = UniqueConfig::new(serde_json::json!({"a": 1}));
        store
            .save(&serde_json::json!(1), "x", "json", "T", &config)
            .unwrap();
        assert_eq!(store.load("x", "T", &config).unwrap(), Some(serde_json::json!(1)));
    }

    proptest::proptest! {
        #[test]
        fn counter_handle_count_matches_number_of_runs(n in 0usize..50) {
            let counter = CounterHandle::new();
            let task = CountingTask::new(counter.clone(), |_ctx, _inputs| Ok(()));
            let store: Arc<dyn ResultsStore> = Arc::new(MemoryStore::new());
            let ctx = TaskContext::new(
                "Noop",
                UniqueConfig::new(serde_json::json!({})),
                Resource::device("cpu:0"),
                store,
            );
            for _ in 0..n {
                task.run(&ctx, PackedResults::empty()).unwrap();
            }
            proptest::prop_assert_eq!(counter.count(), n);
        }
    }
}
