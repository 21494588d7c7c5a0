use colored::Colorize;

use registry::ModuleNode;
use resolve::ExecutionPlan;

use crate::exec::{ExecutionResult, ModuleOutcome, ModuleStatus, RunStatus};
use crate::settings::Settings;

/// All interactions with the text UI should go through this struct.
pub struct Ui {
    /// print per-module progress
    pub verbose: bool,
    /// print the error list at the end of each run
    print_recap: bool,
}

impl Ui {
    pub fn new(settings: &Settings) -> Self {
        Self {
            verbose: settings.verbose > 0,
            print_recap: settings.print_recap,
        }
    }

    /// List the modules a plan will run, and any warnings from resolution.
    pub fn print_plan(&self, plan: &ExecutionPlan) {
        if !self.verbose || plan.is_empty() {
            return;
        }
        eprintln!("\nThe following modules {}:", "will run".green());
        for name in plan.modules() {
            match plan.entry(name) {
                Some(entry) => eprintln!("{} {} ({})", "PLAN".green(), name, entry.category),
                None => eprintln!("{} {}", "PLAN".green(), name),
            }
        }
        for warning in &plan.warnings {
            eprintln!("{}: {}", "NOTE".yellow(), warning);
        }
        eprintln!();
    }

    pub fn module_started(&self, node: &ModuleNode) {
        if self.verbose {
            if node.description.is_empty() {
                eprintln!("{} {}", "RUN".green(), node.name);
            } else {
                eprintln!("{} {} ({})", "RUN".green(), node.name, node.description);
            }
        }
    }

    pub fn module_finished(&self, outcome: &ModuleOutcome) {
        if !self.verbose {
            return;
        }
        let label = match outcome.status {
            ModuleStatus::Succeeded => outcome.status.label().green(),
            ModuleStatus::Skipped => outcome.status.label().yellow(),
            _ => outcome.status.label().red(),
        };
        match &outcome.message {
            Some(msg) => eprintln!("{label} {}: {msg}", outcome.module),
            None => eprintln!("{label} {} in {:?}", outcome.module, outcome.elapsed),
        }
    }

    /// Print the end-of-run summary and the full list of module errors.
    pub fn print_recap(&self, result: &ExecutionResult) {
        if !self.print_recap {
            return;
        }
        match result.status {
            RunStatus::Reused => eprintln!(
                "{} {} modules from run {}.",
                "Reused".green(),
                result.modules_run.len(),
                result.run_id.as_deref().unwrap_or("<unknown>"),
            ),
            RunStatus::Failed => eprintln!("{}", "Run failed before any module ran.".red()),
            RunStatus::Completed => eprintln!(
                "{} {} of {} modules in {:?}.",
                "Completed".green(),
                result.modules_run.len(),
                result.plan.len(),
                result.elapsed,
            ),
        }
        if !result.errors.is_empty() {
            eprintln!("\n{}:\n", "Encountered errors while running modules".red());
            for e in &result.errors {
                eprintln!("{}: {e}", "ERROR".red());
            }
            eprintln!();
        }
    }
}
