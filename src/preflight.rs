use std::collections::BTreeSet;

use serde::Serialize;

use registry::ModuleRegistry;
use resolve::Resolver;

/// A module that would not run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipNotice {
    pub module: String,
    pub reason: String,
}

/// What would happen if `requested` were run, worked out without running it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    pub all_registered: bool,
    /// Requested names that aren't in the registry.
    pub unregistered: Vec<String>,
    pub would_skip: Vec<SkipNotice>,
    /// Resolver warnings, plus the resolution error if there was one.
    pub warnings: Vec<String>,
    /// Execution order, if resolution succeeded.
    pub order: Option<Vec<String>>,
}

impl PreflightReport {
    pub fn is_runnable(&self) -> bool {
        self.all_registered && self.order.is_some()
    }
}

/// Check `requested` against `registry` and try to resolve it.
pub fn preflight_check(registry: &ModuleRegistry, requested: &BTreeSet<String>) -> PreflightReport {
    let mut report = PreflightReport::default();

    for name in requested {
        if !registry.contains(name) {
            report.unregistered.push(name.clone());
            report.would_skip.push(SkipNotice {
                module: name.clone(),
                reason: String::from("not registered"),
            });
        }
    }
    report.all_registered = report.unregistered.is_empty();

    match Resolver::new(registry).resolve(requested) {
        Ok(plan) => {
            report.warnings = plan.warnings;
            report.order = Some(plan.order);
        }
        Err(e) => {
            log::debug!("preflight resolution failed: {e}");
            let reason = format!("resolution failed: {e}");
            for name in requested.iter().filter(|n| registry.contains(n)) {
                report.would_skip.push(SkipNotice {
                    module: name.clone(),
                    reason: reason.clone(),
                });
            }
            report.warnings.push(e.to_string());
        }
    }
    report
}
