#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! `fluidml-core` is the foundation of the FluidML task-graph execution
//! engine: the declarative [Task Spec](spec::TaskSpec), the
//! canonicalized [memoization key](config::UniqueConfig), the
//! [Resource](resource::Resource) value object bound to a worker for the
//! duration of one task, and the [Results Store](store::ResultsStore)
//! contract that every persistence backend implements.
//!
//! *Note*: to be used in conjunction with [fluidml-graph] (expansion)
//! and [fluidml-runtime] (scheduling and execution).
//!
//! [fluidml-graph]: <https://docs.rs/fluidml-graph>
//! [fluidml-runtime]: <https://docs.rs/fluidml-runtime>

pub mod config;
pub mod error;
pub mod node;
pub mod resource;
pub mod spec;
pub mod store;
pub mod task;

pub use config::{ConfigValue, Expand, UniqueConfig};
pub use error::Error;
pub use node::Node;
pub use resource::Resource;
pub use spec::TaskSpec;
pub use store::ResultsStore;
pub use task::{PackedResults, Task, TaskContext};
