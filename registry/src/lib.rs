//! Module definitions and the shared data a run works against.
//!
//! A [`ModuleRegistry`] maps module names to [`ModuleNode`]s. Nodes are plain data
//! plus an [`ModuleExecutable`] capability; the registry does no resolution of its
//! own beyond [`ModuleRegistry::validate`], which checks that every declared
//! dependency exists and that the graph has no cycles.
//!
//! The [`ExecutionContext`] carries the input snapshot, per-module results and
//! runtime flags through a run. Modules only ever see a [`ContextView`].

mod category;
pub use category::Category;

mod executable;
pub use executable::{ModuleExecutable, Output};

mod node;
pub use node::{ModuleNode, DEFAULT_TIMEOUT};

mod context;
pub use context::{ContextError, ContextView, ExecutionContext, Flags};

mod registry;
pub use registry::{ModuleRegistry, Validation};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Module '{0}' is already registered")]
    DuplicateModule(String),
    #[error("Can't register module '{0}': registry is finalized")]
    Finalized(String),
    #[error("Module registry validation failed:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
    #[error("Unknown module category '{0}' (expected light, medium or heavy)")]
    UnknownCategory(String),
}

/// Format a cycle path the way all cycle errors print it, e.g. `a → b → a`.
pub fn format_cycle<S: AsRef<str>>(path: &[S]) -> String {
    let names: Vec<&str> = path.iter().map(|s| s.as_ref()).collect();
    format!("Circular dependency: {}", names.join(" → "))
}
