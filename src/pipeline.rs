use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde_json::Value;

use registry::{ExecutionContext, Flags, ModuleRegistry};
use resolve::{ExecutionPlan, Resolver};

use crate::exec::{CancelToken, ExecutionResult, Executor};
use crate::preflight::{preflight_check, PreflightReport};
use crate::reuse::ReuseCoordinator;
use crate::settings::Settings;

/// Owns a finalized registry and runs requests against it.
pub struct Pipeline {
    registry: ModuleRegistry,
    settings: Settings,
    cancel: CancelToken,
}

impl Pipeline {
    /// Finalize `registry` and wrap it. Fails if the registry doesn't validate.
    pub fn new(mut registry: ModuleRegistry, settings: Settings) -> Result<Self> {
        registry
            .finalize()
            .context("while preparing module pipeline")?;
        Ok(Self {
            registry,
            settings,
            cancel: CancelToken::new(),
        })
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Token that interrupts any run in progress on this pipeline.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn plan(&self, requested: &BTreeSet<String>) -> Result<ExecutionPlan> {
        Resolver::new(&self.registry)
            .resolve(requested)
            .with_context(|| format!("while resolving {} requested modules", requested.len()))
    }

    pub fn preflight(&self, requested: &BTreeSet<String>) -> PreflightReport {
        preflight_check(&self.registry, requested)
    }

    /// Resolve `requested`, then run it against `input` and `flags`.
    ///
    /// Resolution errors are returned. Anything that goes wrong once modules
    /// start running is reported in the [`ExecutionResult`] instead.
    pub fn run(
        &self,
        requested: &BTreeSet<String>,
        input: Value,
        flags: Flags,
        reuse: &dyn ReuseCoordinator,
    ) -> Result<ExecutionResult> {
        let plan = self.plan(requested)?;
        let mut ctx = ExecutionContext::new(input, flags);

        let executor =
            Executor::new(&self.registry, &self.settings).with_cancel(self.cancel.clone());
        let result = executor.execute(&plan, &mut ctx, reuse);

        ctx.close();
        Ok(result)
    }
}
