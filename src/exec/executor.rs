use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use colored::Colorize;

use registry::{ExecutionContext, ModuleNode, ModuleRegistry, Output};
use resolve::ExecutionPlan;
use util::{HashSet, Timer};

use crate::preflight::{self, PreflightReport};
use crate::reuse::ReuseCoordinator;
use crate::settings::Settings;
use crate::ui::Ui;

use super::{
    invoke, CancelToken, ExecutionResult, InputCheck, Invocation, ModuleError, ModuleOutcome,
    ModuleStatus, RequirementCheck, RunStatus, INPUT_MODULE,
};

/// `Executor` is the struct that actually runs a plan.
///
/// By default it walks the plan in order, one module at a time. Before running
/// a module it checks that every dependency succeeded earlier in this run; if
/// not, the module is skipped and the run moves on. Each module runs under its
/// own timeout, and a failure, panic or timeout is recorded against that module
/// only: modules that don't depend on it still run.
///
/// With more than one worker (see [`Executor::with_parallel`]) the plan runs in
/// waves instead. Each wave is every remaining module whose dependencies have
/// all finished; its modules run side by side on read-only views of a frozen
/// snapshot, and their results are stored once the wave is done.
///
/// Modules get a [`registry::ContextView`] and return a value; the executor is
/// the only thing that writes to the [`ExecutionContext`]. Once the plan is
/// done the context is frozen.
pub struct Executor<'a> {
    registry: &'a ModuleRegistry,
    poll_interval: Duration,
    max_workers: usize,
    ui: Ui,
    cancel: CancelToken,
    requirements: Option<Box<dyn RequirementCheck + 'a>>,
    input_check: Option<Box<dyn InputCheck + 'a>>,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a ModuleRegistry, settings: &Settings) -> Self {
        Self {
            registry,
            poll_interval: settings.poll_interval,
            max_workers: settings.max_workers.max(1),
            ui: Ui::new(settings),
            cancel: CancelToken::new(),
            requirements: None,
            input_check: None,
        }
    }

    /// Use `cancel` to interrupt runs from elsewhere.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run up to `max_workers` independent modules at once.
    /// 0 and 1 both mean sequential.
    pub fn with_parallel(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Skip modules whose requirements `check` says the input can't meet.
    pub fn with_requirements(mut self, check: impl RequirementCheck + 'a) -> Self {
        self.requirements = Some(Box::new(check));
        self
    }

    /// Run `check` against the input before any module.
    pub fn with_input_check(mut self, check: impl InputCheck + 'a) -> Self {
        self.input_check = Some(Box::new(check));
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_parallel(&self) -> bool {
        self.max_workers > 1
    }

    /// Report on `requested` without running anything.
    pub fn preflight_check(&self, requested: &BTreeSet<String>) -> PreflightReport {
        preflight::preflight_check(self.registry, requested)
    }

    /// Run `plan` against `ctx`.
    ///
    /// Never fails: per-module problems end up in the returned result's `errors`,
    /// and an unusable input gives a [`RunStatus::Failed`] result with no
    /// modules run.
    pub fn execute(
        &self,
        plan: &ExecutionPlan,
        ctx: &mut ExecutionContext,
        reuse: &dyn ReuseCoordinator,
    ) -> ExecutionResult {
        let timer = Timer::now();
        let mut run = RunLog::new(plan);

        if reuse.is_run_reusable() {
            run.reuse(&reuse.cached_module_names());
            let result = run.into_result(plan, RunStatus::Reused, reuse.run_id(), &timer);
            log::info!(
                "reused run {} with {} modules",
                result.run_id.as_deref().unwrap_or("<unknown>"),
                result.modules_run.len(),
            );
            self.ui.print_recap(&result);
            return result;
        }

        if let Err(e) = self.validate_input(ctx) {
            log::error!("input validation failed: {e:#}");
            let mut result = run.into_result(plan, RunStatus::Failed, None, &timer);
            result.errors.push(ModuleError {
                module: INPUT_MODULE.to_owned(),
                message: format!("{e:#}"),
            });
            self.ui.print_recap(&result);
            return result;
        }

        log::info!(
            "starting run of {} modules ({} workers)",
            plan.len(),
            self.max_workers
        );
        self.ui.print_plan(plan);

        if self.is_parallel() {
            self.run_waves(plan, &mut run, ctx);
        } else {
            self.run_in_order(plan, &mut run, ctx);
        }

        ctx.freeze();

        let result = run.into_result(plan, RunStatus::Completed, None, &timer);
        log::info!(
            "run completed: {} of {} modules succeeded, {} errors",
            result.modules_run.len(),
            plan.len(),
            result.errors.len(),
        );
        self.ui.print_recap(&result);
        result
    }

    fn validate_input(&self, ctx: &ExecutionContext) -> anyhow::Result<()> {
        ctx.validate()?;
        if let Some(check) = &self.input_check {
            check.check(ctx.input())?;
        }
        Ok(())
    }

    fn run_in_order(&self, plan: &ExecutionPlan, run: &mut RunLog, ctx: &mut ExecutionContext) {
        for idx in 0..plan.len() {
            let Some(node) = self.admit(plan, idx, run, ctx) else {
                continue;
            };
            run.start(idx);
            self.ui.module_started(node);
            log::debug!("running {} (timeout {:?})", node.name.cyan(), node.timeout);

            let timer = Timer::now();
            let invocation = invoke(node, ctx.view(), &self.cancel, self.poll_interval);
            self.settle(node, idx, invocation, timer.elapsed(), run, ctx);
        }
    }

    fn run_waves(&self, plan: &ExecutionPlan, run: &mut RunLog, ctx: &mut ExecutionContext) {
        let mut remaining: Vec<usize> = (0..plan.len()).collect();
        let mut wave_no = 0;

        while !remaining.is_empty() {
            let (ready, waiting): (Vec<usize>, Vec<usize>) = remaining
                .into_iter()
                .partition(|idx| self.is_ready(plan, *idx, &*run));
            remaining = waiting;

            // plans are topologically ordered, so this only happens with a broken plan:
            if ready.is_empty() {
                for idx in std::mem::take(&mut remaining) {
                    let msg = Some("dependencies not satisfied".to_owned());
                    self.finish(run, idx, ModuleStatus::Skipped, msg);
                }
                break;
            }

            let batch: Vec<(usize, &ModuleNode)> = ready
                .into_iter()
                .filter_map(|idx| self.admit(plan, idx, run, ctx).map(|node| (idx, node)))
                .collect();
            wave_no += 1;
            log::debug!("wave {wave_no}: {} modules ready", batch.len());

            // every module in a wave sees the same results:
            let snapshot = ctx.frozen_snapshot();
            for chunk in batch.chunks(self.max_workers) {
                if self.cancel.is_cancelled() {
                    for (idx, _) in chunk {
                        let msg = Some("interrupted".to_owned());
                        self.finish(run, *idx, ModuleStatus::Skipped, msg);
                    }
                    continue;
                }
                for (idx, node) in chunk {
                    run.start(*idx);
                    self.ui.module_started(node);
                }
                let finished = self.invoke_all(chunk, &snapshot);
                for ((idx, node), (invocation, elapsed)) in chunk.iter().zip(finished) {
                    self.settle(node, *idx, invocation, elapsed, run, ctx);
                }
            }
        }
    }

    /// Invoke every module in `chunk` at once, returning results in the same order.
    fn invoke_all(
        &self,
        chunk: &[(usize, &ModuleNode)],
        snapshot: &ExecutionContext,
    ) -> Vec<(Invocation, Duration)> {
        let cancel = &self.cancel;
        let poll = self.poll_interval;
        thread::scope(|s| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|&(_, node)| {
                    let view = snapshot.read_only();
                    s.spawn(move || {
                        let timer = Timer::now();
                        let invocation = match view {
                            Ok(view) => invoke(node, view, cancel, poll),
                            Err(e) => Invocation::Finished(Err(anyhow::Error::from(e))),
                        };
                        (invocation, timer.elapsed())
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        let msg = String::from("worker thread panicked");
                        (Invocation::Panicked(msg), Duration::ZERO)
                    })
                })
                .collect()
        })
    }

    /// True once every dependency of the module at `idx` has finished one way
    /// or another.
    fn is_ready(&self, plan: &ExecutionPlan, idx: usize, run: &RunLog) -> bool {
        match self.registry.get(&plan.modules()[idx]) {
            Some(node) => node
                .dependencies
                .iter()
                .all(|d| run.settled.contains(d.as_str()) || !plan.contains(d)),
            None => true,
        }
    }

    /// Decide whether the module at `idx` gets to run. If it doesn't, its
    /// outcome is recorded here.
    fn admit(
        &self,
        plan: &ExecutionPlan,
        idx: usize,
        run: &mut RunLog,
        ctx: &ExecutionContext,
    ) -> Option<&'a ModuleNode> {
        let name = &plan.modules()[idx];
        if self.cancel.is_cancelled() {
            self.finish(run, idx, ModuleStatus::Skipped, Some("interrupted".to_owned()));
            return None;
        }
        let Some(node) = self.registry.get(name) else {
            let msg = format!("module '{name}' is not registered");
            self.finish(run, idx, ModuleStatus::Failed, Some(msg));
            return None;
        };
        if let Some(reason) = self.skip_reason(node, run, ctx) {
            self.finish(run, idx, ModuleStatus::Skipped, Some(reason));
            return None;
        }
        Some(node)
    }

    /// Reason `node` can't run right now, if any.
    fn skip_reason(
        &self,
        node: &ModuleNode,
        run: &RunLog,
        ctx: &ExecutionContext,
    ) -> Option<String> {
        let missing: Vec<&str> = node
            .dependencies
            .iter()
            .filter(|d| !run.succeeded.contains(d.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Some(format!("missing dependencies: {{{}}}", missing.join(", ")));
        }

        if let Some(check) = &self.requirements {
            let unmet = check.unmet(&node.requirements, &ctx.view());
            if !unmet.is_empty() {
                return Some(format!("unmet requirements: {{{}}}", unmet.join(", ")));
            }
        }
        None
    }

    /// Record how an invocation ended, storing its output on success.
    fn settle(
        &self,
        node: &ModuleNode,
        idx: usize,
        invocation: Invocation,
        elapsed: Duration,
        run: &mut RunLog,
        ctx: &mut ExecutionContext,
    ) {
        run.outcomes[idx].elapsed = elapsed;

        let (status, message) = match invocation {
            Invocation::Finished(Ok(output)) => match ctx.store_result(&node.name, output) {
                Ok(()) => (ModuleStatus::Succeeded, None),
                Err(e) => (ModuleStatus::Failed, Some(e.to_string())),
            },
            Invocation::Finished(Err(e)) => (ModuleStatus::Failed, Some(format!("{e:#}"))),
            Invocation::Panicked(msg) => {
                (ModuleStatus::Failed, Some(format!("module panicked: {msg}")))
            }
            Invocation::TimedOut(t) => {
                (ModuleStatus::TimedOut, Some(format!("timed out after {t:?}")))
            }
            Invocation::Interrupted => (ModuleStatus::Failed, Some("interrupted".to_owned())),
        };

        if status == ModuleStatus::Succeeded {
            if let Some(output) = ctx.get_result(&node.name) {
                run.outputs.insert(node.name.clone(), output);
            }
        }
        self.finish(run, idx, status, message);
    }

    fn finish(&self, run: &mut RunLog, idx: usize, status: ModuleStatus, message: Option<String>) {
        run.finish(idx, status, message);
        let outcome = &run.outcomes[idx];
        match status {
            ModuleStatus::Succeeded => log::debug!("{} succeeded", outcome.module),
            _ => log::warn!(
                "{} {}: {}",
                outcome.module,
                status.label().to_lowercase(),
                outcome.message.as_deref().unwrap_or_default(),
            ),
        }
        self.ui.module_finished(outcome);
    }
}

/// Bookkeeping for a single run.
struct RunLog {
    outcomes: Vec<ModuleOutcome>,
    succeeded: HashSet<String>,
    /// modules in a terminal state
    settled: HashSet<String>,
    outputs: BTreeMap<String, Arc<Output>>,
}

impl RunLog {
    fn new(plan: &ExecutionPlan) -> Self {
        let outcomes = plan
            .modules()
            .iter()
            .map(|name| ModuleOutcome {
                module: name.clone(),
                status: ModuleStatus::Pending,
                message: None,
                elapsed: Duration::ZERO,
            })
            .collect();
        Self {
            outcomes,
            succeeded: HashSet::default(),
            settled: HashSet::default(),
            outputs: BTreeMap::new(),
        }
    }

    fn start(&mut self, idx: usize) {
        debug_assert_eq!(self.outcomes[idx].status, ModuleStatus::Pending);
        self.outcomes[idx].status = ModuleStatus::Running;
    }

    fn finish(&mut self, idx: usize, status: ModuleStatus, message: Option<String>) {
        debug_assert!(status.is_terminal());
        debug_assert!(!self.outcomes[idx].status.is_terminal());
        let outcome = &mut self.outcomes[idx];
        outcome.status = status;
        outcome.message = message;
        self.settled.insert(outcome.module.clone());
        if status == ModuleStatus::Succeeded {
            self.succeeded.insert(outcome.module.clone());
        }
    }

    /// Mark plan modules as satisfied by a prior run.
    fn reuse(&mut self, cached: &BTreeSet<String>) {
        for idx in 0..self.outcomes.len() {
            if cached.contains(&self.outcomes[idx].module) {
                self.finish(idx, ModuleStatus::Succeeded, Some("reused".to_owned()));
            } else {
                self.finish(idx, ModuleStatus::Skipped, Some("not in reused run".to_owned()));
            }
        }
        // report the prior run's modules even if this plan didn't name them all:
        self.succeeded.extend(cached.iter().cloned());
    }

    fn into_result(
        self,
        plan: &ExecutionPlan,
        status: RunStatus,
        run_id: Option<String>,
        timer: &Timer,
    ) -> ExecutionResult {
        let mut modules_run: Vec<String> = plan
            .modules()
            .iter()
            .filter(|m| self.succeeded.contains(m.as_str()))
            .cloned()
            .collect();
        let mut extra: Vec<&String> = self
            .succeeded
            .iter()
            .filter(|m| !plan.contains(m.as_str()))
            .collect();
        extra.sort();
        modules_run.extend(extra.into_iter().cloned());

        // a reused run is a cache hit, not a partial failure:
        let errors = match status {
            RunStatus::Reused => Vec::with_capacity(0),
            _ => self
                .outcomes
                .iter()
                .filter(|o| o.status.is_terminal() && o.status != ModuleStatus::Succeeded)
                .map(|o| ModuleError {
                    module: o.module.clone(),
                    message: o.message.clone().unwrap_or_default(),
                })
                .collect(),
        };

        ExecutionResult {
            plan: plan.clone(),
            status,
            modules_run,
            errors,
            outcomes: self.outcomes,
            outputs: self.outputs,
            run_id,
            elapsed: timer.elapsed(),
        }
    }
}
