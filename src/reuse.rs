use std::collections::BTreeSet;

/// Decides whether a prior run can stand in for this one.
///
/// How that's decided (content hashes, configuration hashes, ...) is up to the
/// implementation; the executor only asks these questions.
pub trait ReuseCoordinator {
    /// True if a prior successful run already covers this exact request.
    fn is_run_reusable(&self) -> bool;

    /// Modules the prior run is known to have completed.
    fn cached_module_names(&self) -> BTreeSet<String>;

    /// Identifier of the prior run, for logging.
    fn run_id(&self) -> Option<String> {
        None
    }
}

/// Coordinator that never reuses anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReuse;

impl ReuseCoordinator for NoReuse {
    fn is_run_reusable(&self) -> bool {
        false
    }

    fn cached_module_names(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Fixed answer about a prior run, for callers that worked out
/// reusability somewhere else.
#[derive(Debug, Default, Clone)]
pub struct PriorRun {
    pub reusable: bool,
    pub modules: BTreeSet<String>,
    pub id: Option<String>,
}

impl PriorRun {
    /// A prior run with id `id` that completed `modules` and can be reused.
    pub fn reusable<I, S>(id: impl Into<String>, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reusable: true,
            modules: modules.into_iter().map(Into::into).collect(),
            id: Some(id.into()),
        }
    }

    /// A prior run that exists but doesn't match this request.
    pub fn stale(id: impl Into<String>) -> Self {
        Self {
            reusable: false,
            modules: BTreeSet::new(),
            id: Some(id.into()),
        }
    }
}

impl ReuseCoordinator for PriorRun {
    fn is_run_reusable(&self) -> bool {
        self.reusable
    }

    fn cached_module_names(&self) -> BTreeSet<String> {
        self.modules.clone()
    }

    fn run_id(&self) -> Option<String> {
        self.id.clone()
    }
}
