use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use registry::Output;
use resolve::ExecutionPlan;

/// Where a module is in its lifecycle for the current run.
///
/// `Pending -> Running -> {Succeeded, Failed, TimedOut}`, or
/// `Pending -> Skipped` when the module never starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    TimedOut,
}

impl ModuleStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Short uppercase label used by the text UI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUN",
            Self::Succeeded => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::TimedOut => "TIMED OUT",
        }
    }
}

/// What happened to one module in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleOutcome {
    pub module: String,
    pub status: ModuleStatus,
    /// Reason for anything other than success.
    pub message: Option<String>,
    /// Wall time spent running the module (zero if it never ran).
    pub elapsed: Duration,
}

/// A module that didn't succeed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleError {
    pub module: String,
    pub message: String,
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.module, self.message)
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every module was attempted; some may still have failed or been skipped.
    Completed,
    /// The run was refused before any module ran (e.g. invalid input).
    Failed,
    /// A prior run was reused and no module was executed.
    Reused,
}

/// Report of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// The plan that was executed.
    pub plan: ExecutionPlan,
    pub status: RunStatus,
    /// Modules that succeeded, in plan order.
    pub modules_run: Vec<String>,
    /// Every module that didn't succeed, in plan order.
    pub errors: Vec<ModuleError>,
    /// One entry per plan module, in plan order.
    pub outcomes: Vec<ModuleOutcome>,
    /// Outputs of the modules that ran in this run.
    #[serde(skip)]
    pub outputs: BTreeMap<String, Arc<Output>>,
    /// Id of the reused run, if the reuse coordinator gave one.
    pub run_id: Option<String>,
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// True if the run completed (or was reused) with no module errors.
    pub fn is_success(&self) -> bool {
        self.status != RunStatus::Failed && self.errors.is_empty()
    }

    pub fn outcome(&self, module: &str) -> Option<&ModuleOutcome> {
        self.outcomes.iter().find(|o| o.module == module)
    }

    pub fn status_of(&self, module: &str) -> Option<ModuleStatus> {
        self.outcome(module).map(|o| o.status)
    }

    pub fn output(&self, module: &str) -> Option<&Output> {
        self.outputs.get(module).map(|o| &**o)
    }

    fn with_status(&self, status: ModuleStatus) -> impl Iterator<Item = &ModuleOutcome> + '_ {
        self.outcomes.iter().filter(move |o| o.status == status)
    }

    /// Modules that were skipped, with the reason.
    pub fn skipped(&self) -> Vec<(&str, &str)> {
        self.with_status(ModuleStatus::Skipped)
            .map(|o| (o.module.as_str(), o.message.as_deref().unwrap_or_default()))
            .collect()
    }

    /// Modules that failed or timed out.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ModuleStatus::Failed | ModuleStatus::TimedOut))
            .map(|o| o.module.as_str())
            .collect()
    }
}
