/// Drives a plan against a context
mod executor;
pub use executor::Executor;

/// Run a single module under its timeout
mod invoke;
use invoke::{invoke, Invocation};

/// External interrupt for a run
mod cancel;
pub use cancel::CancelToken;

/// Per-module and per-run results
mod outcome;
pub use outcome::{ExecutionResult, ModuleError, ModuleOutcome, ModuleStatus, RunStatus};

/// Pluggable input and requirement checks
mod checks;
pub use checks::{InputCheck, InputKeys, RequirementCheck};

/// Module name used in error records for problems with the input itself.
pub const INPUT_MODULE: &str = "<input>";
