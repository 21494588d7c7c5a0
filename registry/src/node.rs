use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{Category, ContextView, ModuleExecutable, Output};

/// Timeout for modules that don't set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Static metadata and executable for a single module.
#[derive(Clone)]
pub struct ModuleNode {
    /// Unique name; the registry key.
    pub name: String,
    /// Human-readable description, used for display only.
    pub description: String,
    pub category: Category,
    /// Names of modules whose results this one reads.
    pub dependencies: BTreeSet<String>,
    /// How long a single invocation may run.
    pub timeout: Duration,
    /// Input capabilities this module needs; checked at run time by a
    /// requirement check, if the executor has one.
    pub requirements: BTreeSet<String>,
    pub executable: Arc<dyn ModuleExecutable>,
}

impl ModuleNode {
    /// Create a light module with no dependencies and the default timeout.
    pub fn new(name: impl Into<String>, executable: impl ModuleExecutable + 'static) -> Self {
        Self {
            name: name.into(),
            description: String::with_capacity(0),
            category: Category::default(),
            dependencies: BTreeSet::new(),
            timeout: DEFAULT_TIMEOUT,
            requirements: BTreeSet::new(),
            executable: Arc::new(executable),
        }
    }

    /// Like [`ModuleNode::new`], but takes a closure directly so its
    /// signature can be inferred.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ContextView) -> anyhow::Result<Output> + Send + Sync + 'static,
    {
        Self::new(name, f)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn requires<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements
            .extend(requirements.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for ModuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleNode")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("category", &self.category)
            .field("dependencies", &self.dependencies)
            .field("timeout", &self.timeout)
            .field("requirements", &self.requirements)
            .finish_non_exhaustive()
    }
}
