//!
//! Turns a set of requested module names into an [`ExecutionPlan`] that an
//! executor can walk front to back.
//!
//! Resolution happens in 3 steps:
//! 1. Expand the request into its transitive dependency closure, noting which
//!    modules were only pulled in as dependencies.
//! 2. Search the closure for dependency cycles. Any cycle is an error; no order
//!    is produced for a cyclic graph.
//! 3. Order the closure with Kahn's algorithm, always picking the cheapest ready
//!    module (by [`registry::Category`]) and breaking ties by name.
//!
//! The same request against the same registry always gives the same order.

/// transitive dependency closure
mod closure;

/// deterministic topological ordering
mod order;

/// struct returned by this crate
mod plan;
pub use plan::{ExecutionPlan, Inclusion, PlanEntry};

mod resolver;
pub use resolver::Resolver;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Module '{0}' is not registered")]
    UnknownModule(String),
    #[error("Module '{module}' depends on '{dependency}' which is not registered")]
    UnknownDependency { module: String, dependency: String },
    #[error("{}", registry::format_cycle(.0))]
    CircularDependency(Vec<String>),
}
