//! Expansion: turn a declarative spec DAG into a concrete execution DAG.
//!
//! Each [TaskSpec] is expanded into zero or more [ExpandedTask]s by
//! resolving its `config` map against its `expand` strategy and crossing
//! the result with its already-expanded predecessors. Reduce specs
//! instead aggregate their non-reduce predecessors' instances into
//! fan-in equivalence classes keyed by the ancestor context those
//! siblings share (the ancestor portion of a sibling's `unique_config`
//! once its own spec's contribution is dropped).

use crate::{task::ExpandedTask, ExpandedGraph};
use fluidml_core::{
    config::{ConfigValue, Expand, Kwargs},
    Error, TaskSpec, UniqueConfig,
};
use indexmap::IndexMap;
use itertools::Itertools;

/// Expand a full set of specs into a concrete, schedulable
/// [ExpandedGraph].
///
/// Specs are processed in topological order so that by the time a spec
/// is expanded, every predecessor spec's instances already exist.
/// Returns [Error::CycleDetected] if `specs` contains a cycle, or
/// [Error::InvalidExpansionAxis] if a spec's `config`/`expand`
/// combination is inconsistent (e.g. `zip` axes of unequal length).
///
/// [TaskSpec]: fluidml_core::TaskSpec
pub fn expand(specs: &[TaskSpec]) -> Result<ExpandedGraph, Error> {
    let order = topological_order(specs)?;

    let mut tasks: Vec<ExpandedTask> = Vec::new();
    let mut by_spec: IndexMap<String, Vec<usize>> = IndexMap::new();

    for spec in &order {
        let new_ids = if spec.reduce() {
            expand_reduce_spec(spec, &by_spec, &mut tasks)?
        } else {
            expand_plain_spec(spec, &by_spec, &mut tasks)?
        };
        by_spec.insert(spec.name().to_string(), new_ids);
    }

    link_successors(&mut tasks);

    tracing::debug!(specs = order.len(), tasks = tasks.len(), "expanded task graph");

    Ok(ExpandedGraph::new(tasks))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// A depth-first postorder over the predecessor relation: predecessors
/// always precede their successors, and sibling order follows the input
/// array and each spec's declared predecessor order, so two calls over
/// the same `specs` always produce the same order.
fn topological_order(specs: &[TaskSpec]) -> Result<Vec<&TaskSpec>, Error> {
    let index_by_name: IndexMap<&str, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| (spec.name(), i))
        .collect();

    let mut marks = vec![Mark::Unvisited; specs.len()];
    let mut order = Vec::with_capacity(specs.len());

    fn visit<'a>(
        i: usize,
        specs: &'a [TaskSpec],
        index_by_name: &IndexMap<&str, usize>,
        marks: &mut [Mark],
        order: &mut Vec<&'a TaskSpec>,
    ) -> Result<(), Error> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(Error::CycleDetected(specs[i].name().to_string())),
            Mark::Unvisited => {}
        }
        marks[i] = Mark::InProgress;
        for predecessor_name in specs[i].predecessor_names() {
            if let Some(&p) = index_by_name.get(predecessor_name.as_str()) {
                visit(p, specs, index_by_name, marks, order)?;
            }
        }
        marks[i] = Mark::Done;
        order.push(&specs[i]);
        Ok(())
    }

    for i in 0..specs.len() {
        visit(i, specs, &index_by_name, &mut marks, &mut order)?;
    }

    Ok(order)
}

/// Resolve one spec's `config`/`expand` pair down to the list of
/// concrete `kwargs` candidates it produces, in deterministic order.
fn compute_candidates(spec: &TaskSpec) -> Result<Vec<Kwargs>, Error> {
    let mut fixed: Kwargs = IndexMap::new();
    let mut axis_names: Vec<&String> = Vec::new();
    let mut axis_values: Vec<&Vec<serde_json::Value>> = Vec::new();

    for (key, value) in spec.config() {
        match (spec.expand(), value) {
            (Expand::None, ConfigValue::Scalar(v)) => {
                fixed.insert(key.clone(), v.clone());
            }
            (Expand::None, ConfigValue::List(items)) => {
                fixed.insert(key.clone(), serde_json::Value::Array(items.clone()));
            }
            (Expand::Product | Expand::Zip, ConfigValue::Scalar(v)) => {
                fixed.insert(key.clone(), v.clone());
            }
            (Expand::Product | Expand::Zip, ConfigValue::List(items)) => {
                axis_names.push(key);
                axis_values.push(items);
            }
        }
    }

    if axis_names.is_empty() {
        return Ok(vec![fixed]);
    }

    match spec.expand() {
        Expand::None => unreachable!("axis_names is only populated under product/zip"),
        Expand::Product => {
            let mut out = Vec::new();
            for combo in axis_values.iter().map(|v| v.iter()).multi_cartesian_product() {
                let mut kwargs = fixed.clone();
                for (name, value) in axis_names.iter().zip(combo) {
                    kwargs.insert((*name).clone(), value.clone());
                }
                out.push(kwargs);
            }
            Ok(out)
        }
        Expand::Zip => {
            let len = axis_values[0].len();
            for (name, values) in axis_names.iter().zip(&axis_values) {
                if values.len() != len {
                    return Err(Error::InvalidExpansionAxis {
                        task: spec.name().to_string(),
                        reason: format!(
                            "zip axis '{name}' has length {} but expected {len}",
                            values.len()
                        ),
                    });
                }
            }
            let mut out = Vec::with_capacity(len);
            for i in 0..len {
                let mut kwargs = fixed.clone();
                for (name, values) in axis_names.iter().zip(&axis_values) {
                    kwargs.insert((*name).clone(), values[i].clone());
                }
                out.push(kwargs);
            }
            Ok(out)
        }
    }
}

/// The Cartesian product of each named predecessor spec's already-
/// expanded instance ids, in predecessor-declaration order. A spec with
/// no predecessors produces a single empty combination; a predecessor
/// spec that produced no instances collapses the whole product to
/// empty (nothing to expand against).
fn predecessor_cross_product(
    predecessor_names: &[String],
    by_spec: &IndexMap<String, Vec<usize>>,
) -> Vec<Vec<usize>> {
    if predecessor_names.is_empty() {
        return vec![Vec::new()];
    }
    let empty: Vec<usize> = Vec::new();
    let lists: Vec<&[usize]> = predecessor_names
        .iter()
        .map(|name| {
            by_spec
                .get(name)
                .map(|ids| ids.as_slice())
                .unwrap_or(empty.as_slice())
        })
        .collect();
    if lists.iter().any(|ids| ids.is_empty()) {
        return Vec::new();
    }
    lists
        .iter()
        .map(|ids| ids.iter().copied())
        .multi_cartesian_product()
        .collect()
}

fn expand_plain_spec(
    spec: &TaskSpec,
    by_spec: &IndexMap<String, Vec<usize>>,
    tasks: &mut Vec<ExpandedTask>,
) -> Result<Vec<usize>, Error> {
    let kwargs_candidates = compute_candidates(spec)?;
    let predecessor_names = spec.predecessor_names();
    let combos = predecessor_cross_product(predecessor_names, by_spec);

    let mut created = Vec::new();
    let mut seen: Vec<UniqueConfig> = Vec::new();

    for kwargs in &kwargs_candidates {
        for combo in &combos {
            let predecessor_cfgs: Vec<(&str, &UniqueConfig)> = predecessor_names
                .iter()
                .zip(combo)
                .map(|(name, id)| (name.as_str(), tasks[*id].unique_config()))
                .collect();
            let unique_config = UniqueConfig::merge(spec.name(), kwargs, &predecessor_cfgs);
            if seen.contains(&unique_config) {
                continue;
            }
            seen.push(unique_config.clone());
            let id = tasks.len();
            tasks.push(ExpandedTask::new(
                id,
                kwargs.clone(),
                unique_config,
                combo.clone(),
                spec,
            ));
            created.push(id);
        }
    }
    Ok(created)
}

/// Expand a reduce spec by grouping every instance of its non-reduce
/// predecessor spec(s) into fan-in equivalence classes, one per distinct
/// ancestor context, and emitting one [ExpandedTask] per (own kwargs,
/// class) pair.
fn expand_reduce_spec(
    spec: &TaskSpec,
    by_spec: &IndexMap<String, Vec<usize>>,
    tasks: &mut Vec<ExpandedTask>,
) -> Result<Vec<usize>, Error> {
    let kwargs_candidates = compute_candidates(spec)?;
    let predecessor_names = spec.predecessor_names();

    let mut classes: IndexMap<Vec<u8>, (serde_json::Value, Vec<usize>)> = IndexMap::new();
    for predecessor_name in predecessor_names {
        let Some(ids) = by_spec.get(predecessor_name) else {
            continue;
        };
        for &id in ids {
            let class_key = tasks[id].unique_config().without_key(predecessor_name);
            let canon = UniqueConfig::new(class_key);
            let key_bytes = canon.canonical_bytes();
            classes
                .entry(key_bytes)
                .or_insert_with(|| (canon.as_value().clone(), Vec::new()))
                .1
                .push(id);
        }
    }

    let mut created = Vec::new();
    for kwargs in &kwargs_candidates {
        for (class_base, member_ids) in classes.values() {
            let unique_config = UniqueConfig::merge_with_base(class_base.clone(), spec.name(), kwargs);
            let id = tasks.len();
            tasks.push(ExpandedTask::new(
                id,
                kwargs.clone(),
                unique_config,
                member_ids.clone(),
                spec,
            ));
            created.push(id);
        }
    }
    Ok(created)
}

fn link_successors(tasks: &mut [ExpandedTask]) {
    let edges: Vec<(usize, Vec<usize>)> = tasks
        .iter()
        .map(|task| (task.id(), task.predecessors().to_vec()))
        .collect();
    for (successor_id, predecessor_ids) in edges {
        for predecessor_id in predecessor_ids {
            tasks[predecessor_id].successors_mut().push(successor_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluidml_core::{config::ConfigValue, task::PackedResults, Task, TaskContext, TaskSpec};
    use proptest::prelude::*;
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

    #[test]
    fn linear_chain_has_one_task_per_spec() {
        let a = TaskSpec::new("A", noop_factory());
        let mut b = TaskSpec::new("B", noop_factory());
        b.requires([a.as_ref()]);
        let mut specs = vec![a, b];
        TaskSpec::link_successors(&mut specs);

        let graph = expand(&specs).unwrap();
        assert_eq!(graph.len(), 2);
        let b_task = graph.tasks().iter().find(|t| t.name() == "B").unwrap();
        let a_task = graph.tasks().iter().find(|t| t.name() == "A").unwrap();
        assert_eq!(b_task.predecessors(), &[a_task.id()]);
        assert_eq!(a_task.successors(), &[b_task.id()]);
    }

    #[test]
    fn product_expansion_creates_cross_of_axes() {
        let spec = TaskSpec::new("Train", noop_factory())
            .with_config("lr", ConfigValue::list(vec![0.1, 0.2]).unwrap())
            .with_config("bs", ConfigValue::list(vec![10, 20]).unwrap())
            .with_expand(Expand::Product);
        let specs = vec![spec];

        let graph = expand(&specs).unwrap();
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn zip_with_unequal_length_axes_is_rejected() {
        let spec = TaskSpec::new("Train", noop_factory())
            .with_config("lr", ConfigValue::list(vec![0.1, 0.2, 0.3]).unwrap())
            .with_config("bs", ConfigValue::list(vec![10, 20]).unwrap())
            .with_expand(Expand::Zip);
        let specs = vec![spec];

        let err = expand(&specs).unwrap_err();
        assert!(matches!(err, Error::InvalidExpansionAxis { .. }));
    }

    #[test]
    fn zip_pairs_axes_positionally() {
        let spec = TaskSpec::new("Train", noop_factory())
            .with_config("lr", ConfigValue::list(vec![0.1, 0.2]).unwrap())
            .with_config("bs", ConfigValue::list(vec![10, 20]).unwrap())
            .with_expand(Expand::Zip);
        let specs = vec![spec];

        let graph = expand(&specs).unwrap();
        assert_eq!(graph.len(), 2);
        let kwargs: Vec<_> = graph.tasks().iter().map(|t| t.kwargs().clone()).collect();
        assert_eq!(kwargs[0]["lr"], serde_json::json!(0.1));
        assert_eq!(kwargs[0]["bs"], serde_json::json!(10));
        assert_eq!(kwargs[1]["lr"], serde_json::json!(0.2));
        assert_eq!(kwargs[1]["bs"], serde_json::json!(20));
    }

    #[test]
    fn cyclic_specs_are_rejected() {
        let mut a = TaskSpec::new("A", noop_factory());
        let b = TaskSpec::new("B", noop_factory());
        a.requires([b.as_ref()]);
        let mut specs = vec![a, b];
        // Manually wire the cycle: B also requires A.
        specs[1].requires([specs[0].as_ref()]);
        TaskSpec::link_successors(&mut specs);

        let err = expand(&specs).unwrap_err();
        assert!(matches!(err, Error::CycleDetected(_)));
    }

    #[test]
    fn reduce_fan_in_groups_siblings_sharing_ancestor() {
        let data = TaskSpec::new("Data", noop_factory());
        let mut train = TaskSpec::new("Train", noop_factory())
            .with_config("lr", ConfigValue::list(vec![0.1, 0.2]).unwrap())
            .with_expand(Expand::Product);
        train.requires([data.as_ref()]);
        let mut select = TaskSpec::new("Select", noop_factory()).with_reduce(true);
        select.requires([train.as_ref()]);

        let mut specs = vec![data, train, select];
        TaskSpec::link_successors(&mut specs);

        let graph = expand(&specs).unwrap();
        let train_ids: Vec<usize> = graph
            .tasks()
            .iter()
            .filter(|t| t.name() == "Train")
            .map(|t| t.id())
            .collect();
        assert_eq!(train_ids.len(), 2);

        let select_tasks: Vec<_> = graph.tasks().iter().filter(|t| t.name() == "Select").collect();
        assert_eq!(select_tasks.len(), 1);
        let mut predecessors = select_tasks[0].predecessors().to_vec();
        predecessors.sort_unstable();
        let mut expected = train_ids;
        expected.sort_unstable();
        assert_eq!(predecessors, expected);
    }

    #[test]
    fn reduce_fan_in_splits_by_distinct_ancestor() {
        let data = TaskSpec::new("Data", noop_factory())
            .with_config("path", ConfigValue::list(vec!["/a", "/b"]).unwrap())
            .with_expand(Expand::Product);
        let mut train = TaskSpec::new("Train", noop_factory())
            .with_config("lr", ConfigValue::list(vec![0.1, 0.2]).unwrap())
            .with_expand(Expand::Product);
        train.requires([data.as_ref()]);
        let mut select = TaskSpec::new("Select", noop_factory()).with_reduce(true);
        select.requires([train.as_ref()]);

        let mut specs = vec![data, train, select];
        TaskSpec::link_successors(&mut specs);

        let graph = expand(&specs).unwrap();
        let select_tasks: Vec<_> = graph.tasks().iter().filter(|t| t.name() == "Select").collect();
        assert_eq!(select_tasks.len(), 2);
        for select_task in &select_tasks {
            assert_eq!(select_task.predecessors().len(), 2);
        }
    }

    proptest! {
        #[test]
        fn expansion_is_deterministic(axis_len in 1usize..6) {
            let values: Vec<f64> = (0..axis_len).map(|i| i as f64 * 0.1).collect();
            let spec = TaskSpec::new("Train", noop_factory())
                .with_config("lr", ConfigValue::list(values).unwrap())
                .with_expand(Expand::Product);
            let specs = vec![spec];

            let first = expand(&specs).unwrap();
            let second = expand(&specs).unwrap();

            prop_assert_eq!(first.len(), axis_len);
            prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.tasks().iter().zip(second.tasks().iter()) {
                prop_assert_eq!(a.unique_config().canonical_bytes(), b.unique_config().canonical_bytes());
            }
        }
    }
}
