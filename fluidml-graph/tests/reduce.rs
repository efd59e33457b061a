//! Fixtures exercising reduce fan-in and parameter expansion at the
//! graph level, independent of the scheduler.

use fluidml_core::{
    config::{ConfigValue, Expand},
    task::PackedResults,
    Error, Task, TaskContext, TaskSpec,
};
use std::sync::Arc;

struct NoopTask;

impl Task for NoopTask {
    fn run(&self, _ctx: &TaskContext, _inputs: PackedResults) -> anyhow::Result<()> {
        Ok(())
    }
}

fn noop_factory() -> fluidml_core::spec::TaskFactory {
    Arc::new(|_kwargs| Arc::new(NoopTask) as Arc<dyn Task>)
}

/// S2 — product expansion against a non-expanding predecessor: one
/// `Data` instance crossed with two `Train` configs yields three
/// expanded tasks total, each `Train` instance nesting the shared
/// `Data` config in its `unique_config`.
#[test]
fn product_expansion_against_shared_predecessor() {
    let data = TaskSpec::new("Data", noop_factory()).with_config(
        "path",
        ConfigValue::scalar("/datasets/mnist").unwrap(),
    );
    let mut train = TaskSpec::new("Train", noop_factory())
        .with_config("lr", ConfigValue::list(vec![0.1, 0.01]).unwrap())
        .with_config("bs", ConfigValue::list(vec![32]).unwrap())
        .with_expand(Expand::Product);
    train.requires([data.as_ref()]);

    let mut specs = vec![data, train];
    TaskSpec::link_successors(&mut specs);

    let graph = fluidml_graph::expand(&specs).unwrap();
    assert_eq!(graph.len(), 3);

    let train_tasks: Vec<_> = graph.tasks().iter().filter(|t| t.name() == "Train").collect();
    assert_eq!(train_tasks.len(), 2);
    for train_task in &train_tasks {
        let data_id = train_task.predecessors()[0];
        let data_task = graph.get(data_id).unwrap();
        assert_eq!(
            train_task.unique_config().as_value()["Data"],
            *data_task.unique_config().as_value()
        );
    }
}

/// S3 — a `zip` expansion over axes of unequal length is rejected
/// before any task is created, let alone run.
#[test]
fn zip_length_mismatch_raises_before_any_task_is_created() {
    let spec = TaskSpec::new("Train", noop_factory())
        .with_config("lr", ConfigValue::list(vec![0.1, 0.01]).unwrap())
        .with_config("bs", ConfigValue::list(vec![32]).unwrap())
        .with_expand(Expand::Zip);

    let err = fluidml_graph::expand(&[spec]).unwrap_err();
    assert!(matches!(err, Error::InvalidExpansionAxis { task, .. } if task == "Train"));
}

/// S4 — a reduce spec downstream of a two-way product expansion
/// collapses to one task whose `predecessors` are exactly the two
/// `Train` expansions, so its dispatch-time `reduced_results` carries
/// one record per `Train` sibling.
#[test]
fn reduce_collapses_product_expansion_into_one_task() {
    let data = TaskSpec::new("Data", noop_factory());
    let mut train = TaskSpec::new("Train", noop_factory())
        .with_config("lr", ConfigValue::list(vec![0.1, 0.01]).unwrap())
        .with_expand(Expand::Product);
    train.requires([data.as_ref()]);
    let mut select = TaskSpec::new("Select", noop_factory()).with_reduce(true);
    select.requires([train.as_ref()]);

    let mut specs = vec![data, train, select];
    TaskSpec::link_successors(&mut specs);

    let graph = fluidml_graph::expand(&specs).unwrap();

    let train_ids: Vec<usize> = graph
        .tasks()
        .iter()
        .filter(|t| t.name() == "Train")
        .map(|t| t.id())
        .collect();
    assert_eq!(train_ids.len(), 2);

    let select_tasks: Vec<_> = graph.tasks().iter().filter(|t| t.name() == "Select").collect();
    assert_eq!(select_tasks.len(), 1);

    let select_task = select_tasks[0];
    assert!(select_task.reduce());
    let mut predecessors = select_task.predecessors().to_vec();
    predecessors.sort_unstable();
    let mut expected = train_ids.clone();
    expected.sort_unstable();
    assert_eq!(predecessors, expected);

    // The selected data is every Train instance's result: the sibling
    // count a reduce dispatch will see under `reduced_results`.
    assert_eq!(select_task.predecessors().len(), 2);
}

/// Two distinct ancestor contexts (two `Data` configs) each fan in
/// their own `Train` siblings into a separate `Select` instance; one
/// reduce task never aggregates across ancestor contexts it doesn't
/// share.
#[test]
fn reduce_equivalence_classes_never_cross_ancestor_contexts() {
    let data = TaskSpec::new("Data", noop_factory())
        .with_config("path", ConfigValue::list(vec!["/a", "/b"]).unwrap())
        .with_expand(Expand::Product);
    let mut train = TaskSpec::new("Train", noop_factory())
        .with_config("lr", ConfigValue::list(vec![0.1, 0.2, 0.3]).unwrap())
        .with_expand(Expand::Product);
    train.requires([data.as_ref()]);
    let mut select = TaskSpec::new("Select", noop_factory()).with_reduce(true);
    select.requires([train.as_ref()]);

    let mut specs = vec![data, train, select];
    TaskSpec::link_successors(&mut specs);

    let graph = fluidml_graph::expand(&specs).unwrap();

    let select_tasks: Vec<_> = graph.tasks().iter().filter(|t| t.name() == "Select").collect();
    assert_eq!(select_tasks.len(), 2);
    for select_task in &select_tasks {
        assert_eq!(select_task.predecessors().len(), 3);
    }

    // The two classes' predecessor sets are disjoint: no Train
    // instance feeds both Select siblings.
    let (first, second) = (select_tasks[0].predecessors(), select_tasks[1].predecessors());
    assert!(first.iter().all(|id| !second.contains(id)));
}

/// A reduce spec with its own expansion axis produces one task per
/// (own kwargs, equivalence class) pair: two `Select` configs times
/// one ancestor context is two tasks, each still fanning in every
/// `Train` sibling.
#[test]
fn reduce_specs_own_expansion_axis_multiplies_independently_of_fan_in() {
    let data = TaskSpec::new("Data", noop_factory());
    let mut train = TaskSpec::new("Train", noop_factory())
        .with_config("lr", ConfigValue::list(vec![0.1, 0.2]).unwrap())
        .with_expand(Expand::Product);
    train.requires([data.as_ref()]);
    let mut select = TaskSpec::new("Select", noop_factory())
        .with_config("metric", ConfigValue::list(vec!["acc", "loss"]).unwrap())
        .with_expand(Expand::Product)
        .with_reduce(true);
    select.requires([train.as_ref()]);

    let mut specs = vec![data, train, select];
    TaskSpec::link_successors(&mut specs);

    let graph = fluidml_graph::expand(&specs).unwrap();
    let select_tasks: Vec<_> = graph.tasks().iter().filter(|t| t.name() == "Select").collect();
    assert_eq!(select_tasks.len(), 2);
    for select_task in &select_tasks {
        assert_eq!(select_task.predecessors().len(), 2);
    }
}
