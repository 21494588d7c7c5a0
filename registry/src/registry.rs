use std::collections::{BTreeMap, BTreeSet};

use util::{cycle, IdVec, NodeIdx};

use crate::{format_cycle, Error, ModuleNode};

/// Result of [`ModuleRegistry::validate`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validation {
    /// One message per problem found, in a stable order.
    pub errors: Vec<String>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Mapping from module name to module definition.
///
/// Dependencies aren't checked when a module is registered, so modules can be
/// added in any order. Call [`ModuleRegistry::finalize`] once everything is in
/// to validate the whole graph and lock the registry.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    nodes: BTreeMap<String, ModuleNode>,
    finalized: bool,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `node` to the registry.
    pub fn register(&mut self, node: ModuleNode) -> Result<(), Error> {
        if self.finalized {
            return Err(Error::Finalized(node.name));
        }
        if self.nodes.contains_key(&node.name) {
            return Err(Error::DuplicateModule(node.name));
        }
        log::trace!(
            "registering module {} ({}, depends on {:?})",
            node.name,
            node.category,
            node.dependencies,
        );
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&ModuleNode> {
        self.nodes.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn all_names(&self) -> BTreeSet<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Iterate over all modules in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleNode> + '_ {
        self.nodes.values()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Check every registered module: all dependencies must be registered,
    /// and the dependency graph must be acyclic.
    pub fn validate(&self) -> Validation {
        let mut errors = Vec::with_capacity(0);
        for node in self.nodes.values() {
            for dep in &node.dependencies {
                if !self.nodes.contains_key(dep) {
                    errors.push(format!(
                        "Module '{}' depends on '{}' which is not registered",
                        node.name, dep,
                    ));
                }
            }
        }
        if let Some(path) = self.find_cycle(self.nodes.keys().map(String::as_str)) {
            errors.push(format_cycle(&path));
        }
        Validation { errors }
    }

    /// Validate the registry and lock it against further registration.
    /// Does nothing if the registry was already finalized.
    pub fn finalize(&mut self) -> Result<(), Error> {
        if self.finalized {
            log::debug!("module registry already finalized");
            return Ok(());
        }
        let validation = self.validate();
        if !validation.is_ok() {
            for e in &validation.errors {
                log::error!("{e}");
            }
            return Err(Error::Invalid(validation.errors));
        }
        self.finalized = true;
        log::info!("module registry finalized with {} modules", self.len());
        Ok(())
    }

    /// Look for a dependency cycle among `names`, following only edges that
    /// stay inside that set. Unregistered names are ignored.
    ///
    /// Names and edges are walked in sorted order, so the cycle reported for a
    /// given graph is always the same one.
    pub fn find_cycle<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Option<Vec<String>> {
        let names: BTreeSet<&str> = names.into_iter().filter(|n| self.contains(n)).collect();
        let index: BTreeMap<&str, NodeIdx> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (*n, NodeIdx::from(i)))
            .collect();

        let mut edges: IdVec<NodeIdx, Vec<NodeIdx>> = IdVec::with_capacity(names.len());
        let mut labels: IdVec<NodeIdx, &str> = IdVec::with_capacity(names.len());
        for name in &names {
            let deps = &self.nodes[*name].dependencies;
            edges.push(
                deps.iter()
                    .filter_map(|d| index.get(d.as_str()).copied())
                    .collect(),
            );
            labels.push(*name);
        }

        let path = cycle::find_cycle(&edges)?;
        log::trace!("found cycle through {} modules", path.len() - 1);
        Some(path.into_iter().map(|i| labels.get(i).to_string()).collect())
    }
}
