use crate::ContextView;

/// Value a module produces. Opaque to the scheduler; stored verbatim
/// for downstream modules to read.
pub type Output = serde_json::Value;

/// The unit of work behind a module.
///
/// Implementations get a read-only view of the run's context and either return
/// an [`Output`] or fail. They must not hold on to the view past the call or
/// call back into the scheduler.
pub trait ModuleExecutable: Send + Sync {
    fn execute(&self, ctx: &ContextView) -> anyhow::Result<Output>;
}

impl<F> ModuleExecutable for F
where
    F: Fn(&ContextView) -> anyhow::Result<Output> + Send + Sync,
{
    fn execute(&self, ctx: &ContextView) -> anyhow::Result<Output> {
        self(ctx)
    }
}
