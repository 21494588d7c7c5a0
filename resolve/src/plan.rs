use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use registry::Category;

/// Why a module is part of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Inclusion {
    /// Named in the request.
    Requested,
    /// Not requested, but the named module needs it.
    DependencyOf(String),
}

/// Per-module information recorded in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub category: Category,
    pub dependencies: BTreeSet<String>,
    pub inclusion: Inclusion,
}

/// Validated, ordered closure of the modules needed to satisfy a request.
///
/// Every module in `order` appears after all of its dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// Modules named in the request.
    pub requested: BTreeSet<String>,
    /// Execution order.
    pub order: Vec<String>,
    /// Dependency graph restricted to the modules in this plan.
    pub graph: BTreeMap<String, PlanEntry>,
    /// Advisory messages, e.g. modules added only as dependencies.
    pub warnings: Vec<String>,
}

impl ExecutionPlan {
    #[inline]
    pub fn modules(&self) -> &[String] {
        &self.order
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, module: &str) -> bool {
        self.graph.contains_key(module)
    }

    /// Position of `module` in the execution order.
    pub fn position(&self, module: &str) -> Option<usize> {
        self.order.iter().position(|m| m == module)
    }

    pub fn entry(&self, module: &str) -> Option<&PlanEntry> {
        self.graph.get(module)
    }

    pub fn dependencies_of(&self, module: &str) -> Option<&BTreeSet<String>> {
        self.graph.get(module).map(|e| &e.dependencies)
    }

    /// Modules in the plan that weren't requested, in execution order.
    pub fn added_as_dependencies(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|m| !self.requested.contains(*m))
            .map(String::as_str)
            .collect()
    }
}
