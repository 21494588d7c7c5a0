use std::collections::{BTreeMap, BTreeSet};

use registry::{Category, ModuleRegistry};
use util::{IdVec, NodeIdx};

use crate::Error;

/// Kahn's algorithm over `members`, which must be dependency-closed and acyclic.
///
/// Among the modules whose dependencies have all been placed, the next one is
/// always the smallest by `(category, name)`. So absent an edge that says
/// otherwise, every light module comes before every medium one, and every
/// medium one before every heavy one.
pub fn order<'a>(
    registry: &ModuleRegistry,
    members: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<String>, Error> {
    let names: BTreeSet<&str> = members.into_iter().collect();
    let index: BTreeMap<&str, NodeIdx> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (*n, NodeIdx::from(i)))
        .collect();

    let mut labels: IdVec<NodeIdx, (Category, &str)> = IdVec::with_capacity(names.len());
    let mut dependents: IdVec<NodeIdx, Vec<NodeIdx>> = IdVec::fill(Vec::new(), names.len());
    let mut waiting_on: IdVec<NodeIdx, usize> = IdVec::fill(0, names.len());

    for name in &names {
        let node = registry
            .get(name)
            .ok_or_else(|| Error::UnknownModule((*name).to_owned()))?;
        let id = labels.push((node.category, *name));
        for dep in &node.dependencies {
            let dep_id = index.get(dep.as_str()).ok_or_else(|| Error::UnknownDependency {
                module: (*name).to_owned(),
                dependency: dep.clone(),
            })?;
            dependents.get_mut(*dep_id).push(id);
            *waiting_on.get_mut(id) += 1;
        }
    }

    let mut ready: BTreeSet<((Category, &str), NodeIdx)> = waiting_on
        .iter_ids()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| (*labels.get(id), id))
        .collect();

    let mut order = Vec::with_capacity(names.len());
    while let Some(((category, name), id)) = ready.pop_first() {
        log::trace!("placing {name} ({category}) at position {}", order.len());
        order.push(name.to_owned());
        for dependent in dependents.get(id) {
            let count = waiting_on.get_mut(*dependent);
            *count -= 1;
            if *count == 0 {
                ready.insert((*labels.get(*dependent), *dependent));
            }
        }
    }

    // only possible if the caller skipped cycle detection;
    // never hand back a partial order:
    if order.len() != names.len() {
        let path = registry
            .find_cycle(names.iter().copied())
            .unwrap_or_else(|| names.iter().map(|n| (*n).to_owned()).collect());
        return Err(Error::CircularDependency(path));
    }
    Ok(order)
}
