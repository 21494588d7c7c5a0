use std::collections::{BTreeMap, BTreeSet, VecDeque};

use colored::Colorize;

use registry::ModuleRegistry;

use crate::{Error, Inclusion};

const QUEUE_CAPACITY: usize = 32;

/// Breadth-first expansion of a request into every module it needs.
///
/// Roots are enqueued in name order and each module's dependencies are visited
/// in name order, so the module recorded as having pulled in a dependency is
/// stable between runs.
pub fn expand(
    registry: &ModuleRegistry,
    requested: &BTreeSet<String>,
) -> Result<BTreeMap<String, Inclusion>, Error> {
    let mut members: BTreeMap<String, Inclusion> = BTreeMap::new();
    let mut queue: VecDeque<&str> = VecDeque::with_capacity(QUEUE_CAPACITY);

    for name in requested {
        if !registry.contains(name) {
            return Err(Error::UnknownModule(name.clone()));
        }
        members.insert(name.clone(), Inclusion::Requested);
        queue.push_back(name);
    }

    while let Some(name) = queue.pop_front() {
        // every enqueued name was checked against the registry first:
        let Some(node) = registry.get(name) else {
            return Err(Error::UnknownModule(name.to_owned()));
        };
        for dep in &node.dependencies {
            if !registry.contains(dep) {
                return Err(Error::UnknownDependency {
                    module: name.to_owned(),
                    dependency: dep.clone(),
                });
            }
            if !members.contains_key(dep) {
                log::trace!("{} pulls in {}", name.cyan(), dep.cyan());
                members.insert(dep.clone(), Inclusion::DependencyOf(name.to_owned()));
                queue.push_back(dep);
            }
        }
    }

    log::debug!(
        "expanded {} requested modules to {}",
        requested.len(),
        members.len()
    );
    Ok(members)
}
