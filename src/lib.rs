/// Running plans
mod exec;
/// Registry, resolve and run in one place
mod pipeline;
/// Dry-run checks
mod preflight;
/// Reusing prior runs
mod reuse;
/// Environment-driven run settings
pub mod settings;
/// Text UI
mod ui;

pub use exec::{
    CancelToken, ExecutionResult, Executor, InputCheck, InputKeys, ModuleError, ModuleOutcome,
    ModuleStatus, RequirementCheck, RunStatus, INPUT_MODULE,
};
pub use pipeline::Pipeline;
pub use preflight::{preflight_check, PreflightReport, SkipNotice};
pub use reuse::{NoReuse, PriorRun, ReuseCoordinator};
pub use settings::Settings;

pub use registry::{
    Category, ContextError, ContextView, ExecutionContext, Flags, ModuleExecutable, ModuleNode,
    ModuleRegistry, Output, Validation, DEFAULT_TIMEOUT,
};
pub use resolve::{ExecutionPlan, Inclusion, PlanEntry, Resolver};

/// Registry-level errors.
pub use registry::Error as RegistryError;
/// Resolution errors.
pub use resolve::Error as ResolveError;

/// Send log output to stderr at the level implied by `verbose`
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace).
pub fn init_logging(verbose: u8) {
    let settings = Settings {
        verbose,
        ..Settings::default()
    };
    simple_logging::log_to_stderr(settings.log_level());
}
