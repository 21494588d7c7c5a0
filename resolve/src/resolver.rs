use std::collections::{BTreeMap, BTreeSet};

use colored::Colorize;

use registry::ModuleRegistry;

use crate::{closure, order, Error, ExecutionPlan, Inclusion, PlanEntry};

/// Resolves requests against a single registry.
pub struct Resolver<'a> {
    registry: &'a ModuleRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        if !registry.is_finalized() {
            log::debug!("resolving against a registry that hasn't been finalized");
        }
        Self { registry }
    }

    /// Expand, check and order `requested`.
    ///
    /// Fails if a requested module or any declared dependency isn't registered,
    /// or if the closure contains a dependency cycle. Nothing is ordered until
    /// all of those checks have passed.
    pub fn resolve(&self, requested: &BTreeSet<String>) -> Result<ExecutionPlan, Error> {
        if requested.is_empty() {
            return Ok(ExecutionPlan::default());
        }

        let members = closure::expand(self.registry, requested)?;

        if let Some(path) = self.registry.find_cycle(members.keys().map(String::as_str)) {
            log::error!("{}", registry::format_cycle(&path).red());
            return Err(Error::CircularDependency(path));
        }

        let order = order::order(self.registry, members.keys().map(String::as_str))?;
        log::info!("execution order: {}", order.join(", "));

        let mut warnings = Vec::with_capacity(0);
        for name in &order {
            if let Some(Inclusion::DependencyOf(parent)) = members.get(name) {
                warnings.push(format!(
                    "module {name} added implicitly as a dependency of {parent}"
                ));
            }
        }

        let graph = members
            .into_iter()
            .map(|(name, inclusion)| {
                // closure::expand only admits registered names:
                let node = self
                    .registry
                    .get(&name)
                    .ok_or_else(|| Error::UnknownModule(name.clone()))?;
                let entry = PlanEntry {
                    category: node.category,
                    dependencies: node.dependencies.clone(),
                    inclusion,
                };
                Ok((name, entry))
            })
            .collect::<Result<BTreeMap<_, _>, Error>>()?;

        Ok(ExecutionPlan {
            requested: requested.clone(),
            order,
            graph,
            warnings,
        })
    }

    /// Just the execution order for `requested`.
    pub fn resolve_order(&self, requested: &BTreeSet<String>) -> Result<Vec<String>, Error> {
        Ok(self.resolve(requested)?.order)
    }

    /// Map each module needed by `requested` to its declared dependencies.
    pub fn dependency_graph(
        &self,
        requested: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, Vec<String>>, Error> {
        let plan = self.resolve(requested)?;
        Ok(plan
            .graph
            .into_iter()
            .map(|(name, entry)| (name, entry.dependencies.into_iter().collect()))
            .collect())
    }
}
