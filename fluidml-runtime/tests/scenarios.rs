//! End-to-end `Flow::run` scenarios over the in-memory store, covering
//! the skip/force/cancellation behavior that only shows up once
//! scheduling and the store interact.

use fluidml_core::{task::PackedResults, Resource, Task, TaskContext, TaskSpec};
use fluidml_runtime::{
    store::MemoryStore,
    test_utils::{CounterHandle, CountingTask},
    Flow, ForceDirective,
};
use std::sync::Arc;

fn resources(n: usize) -> Vec<Resource> {
    (0..n).map(|i| Resource::device(format!("cpu:{i}"))).collect()
}

fn counting_spec(name: &str, counter: CounterHandle) -> TaskSpec {
    TaskSpec::new(
        name.to_string(),
        Arc::new(move |_kwargs| {
            Arc::new(CountingTask::new(counter.clone(), |ctx, _inputs| {
                ctx.save(&serde_json::json!(1), "done", "json")?;
                Ok(())
            })) as Arc<dyn Task>
        }),
    )
    .with_publishes(vec!["done".to_string()])
}

/// S1 — linear skip: a second run over the same spec graph and store
/// skips every task, since each already has a complete run.
#[tokio::test]
async fn linear_skip_runs_each_task_exactly_once_across_two_invocations() {
    let counter_a = CounterHandle::new();
    let counter_b = CounterHandle::new();

    let a = counting_spec("A", counter_a.clone());
    let mut b = counting_spec("B", counter_b.clone());
    b.requires([a.as_ref()]);
    let mut specs = vec![a, b];
    TaskSpec::link_successors(&mut specs);

    let flow = Flow::new(specs);
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    flow.run(resources(2), store.clone(), "proj", None).await.unwrap();
    flow.run(resources(2), store.clone(), "proj", None).await.unwrap();

    assert_eq!(counter_a.count(), 1);
    assert_eq!(counter_b.count(), 1);
}

/// S5 — force cascade: forcing `"B+"` re-runs `B` and its successor
/// `C`, but leaves `A` skipped.
#[tokio::test]
async fn force_cascade_reruns_only_the_forced_task_and_its_successors() {
    let counter_a = CounterHandle::new();
    let counter_b = CounterHandle::new();
    let counter_c = CounterHandle::new();

    let a = counting_spec("A", counter_a.clone());
    let mut b = counting_spec("B", counter_b.clone());
    b.requires([a.as_ref()]);
    let mut c = counting_spec("C", counter_c.clone());
    c.requires([b.as_ref()]);
    let mut specs = vec![a, b, c];
    TaskSpec::link_successors(&mut specs);

    let flow = Flow::new(specs);
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    flow.run(resources(3), store.clone(), "proj", None).await.unwrap();
    assert_eq!((counter_a.count(), counter_b.count(), counter_c.count()), (1, 1, 1));

    flow.run(
        resources(3),
        store.clone(),
        "proj",
        Some(vec![ForceDirective::from("B+")]),
    )
    .await
    .unwrap();

    assert_eq!(counter_a.count(), 1, "A was never forced, so it stays skipped");
    assert_eq!(counter_b.count(), 2, "B was forced directly");
    assert_eq!(counter_c.count(), 2, "C is B's successor under the cascade");
}

/// S6 — failure cancellation: when `A` fails, its successors `B` and
/// `C` never start, and `Flow::run` surfaces the failure without
/// leaving any artifacts behind for the unreached tasks.
#[tokio::test]
async fn failing_predecessor_cancels_its_successors() {
    let failing = TaskSpec::new(
        "A",
        Arc::new(|_kwargs| {
            Arc::new(FailingTask) as Arc<dyn Task>
        }),
    );
    let counter_b = CounterHandle::new();
    let counter_c = CounterHandle::new();
    let mut b = counting_spec("B", counter_b.clone());
    b.requires([failing.as_ref()]);
    let mut c = counting_spec("C", counter_c.clone());
    c.requires([failing.as_ref()]);

    let mut specs = vec![failing, b, c];
    TaskSpec::link_successors(&mut specs);

    let flow = Flow::new(specs);
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    let err = flow.run(resources(3), store.clone(), "proj", None).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unreached"));

    assert_eq!(counter_b.count(), 0);
    assert_eq!(counter_c.count(), 0);
    assert!(store.list_runs("B").unwrap().is_empty());
    assert!(store.list_runs("C").unwrap().is_empty());
}

struct FailingTask;

impl Task for FailingTask {
    fn run(&self, _ctx: &TaskContext, _inputs: PackedResults) -> anyhow::Result<()> {
        anyhow::bail!("boom")
    }
}

/// S4 — reduce: a `Select` task downstream of a two-way `Train` product
/// expansion receives exactly one `reduced_results` record per sibling,
/// dispatched through the real scheduler rather than inspected at the
/// graph level alone.
#[tokio::test]
async fn reduce_task_receives_one_record_per_sibling() {
    use fluidml_core::config::{ConfigValue, Expand};

    let lengths: Arc<std::sync::Mutex<Vec<usize>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

    let train = TaskSpec::new(
        "Train",
        Arc::new(|_kwargs| {
            Arc::new(CountingTask::new(CounterHandle::new(), |ctx, _inputs| {
                ctx.save(&serde_json::json!(1), "score", "json")?;
                Ok(())
            })) as Arc<dyn Task>
        }),
    )
    .with_config("lr", ConfigValue::list(vec![0.1, 0.2]).unwrap())
    .with_expand(Expand::Product)
    .with_publishes(vec!["score".to_string()]);

    let observed = lengths.clone();
    let mut select = TaskSpec::new(
        "Select",
        Arc::new(move |_kwargs| {
            let observed = observed.clone();
            Arc::new(CountingTask::new(CounterHandle::new(), move |_ctx, inputs| {
                let records = inputs.reduced().expect("reduce task gets reduced_results");
                observed.lock().unwrap().push(records.len());
                Ok(())
            })) as Arc<dyn Task>
        }),
    )
    .with_reduce(true);
    select.requires([train.as_ref()]);

    let mut specs = vec![train, select];
    TaskSpec::link_successors(&mut specs);

    let flow = Flow::new(specs);
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    flow.run(resources(2), store, "proj", None).await.unwrap();

    assert_eq!(lengths.lock().unwrap().as_slice(), &[2]);
}

/// §5: with no resources supplied at all, `Flow::run` still executes
/// every task on a single synthesized worker instead of deadlocking on
/// an empty resource pool.
#[tokio::test]
async fn flow_runs_to_completion_with_no_resources_supplied() {
    let counter = CounterHandle::new();
    let spec = counting_spec("Solo", counter.clone());

    let flow = Flow::new(vec![spec]);
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    flow.run(Vec::new(), store, "proj", None).await.unwrap();

    assert_eq!(counter.count(), 1);
}
