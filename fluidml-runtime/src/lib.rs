#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! `fluidml-runtime` is the orchestration layer of the FluidML
//! task-graph execution engine: [Flow](flow::Flow) drives expansion and
//! hands the concrete graph to the [scheduler], a bounded worker pool
//! where each worker holds one exclusive [Resource](fluidml_core::Resource)
//! slot for the duration of a task. It also carries the reference
//! [ResultsStore](fluidml_core::ResultsStore) implementations
//! (`store::local`, `store::memory`), [Settings], and logging
//! initialization.
//!
//! *Note*: built on top of [fluidml_core] (the data model) and
//! [fluidml_graph] (expansion).

pub mod channel;
pub mod error;
pub mod flow;
pub mod logger;
mod resource_pool;
mod scheduler;
pub mod settings;
pub mod store;
/// Test utilities: an in-memory [ResultsStore](fluidml_core::ResultsStore)
/// and recording [Task](fluidml_core::Task) implementations, shared by
/// this crate's own tests and available to downstream crates under the
/// `test-utils` feature.
#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod test_utils;
mod worker;

pub use error::Error;
pub use flow::{AggregatedResult, Flow, ForceDirective, ResultBundle, ResultRecord};
pub use settings::Settings;
