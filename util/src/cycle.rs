//! Three-colour depth-first search for cycles in a directed graph.

use crate::{IdVec, NodeIdx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Search `edges` (adjacency lists indexed by node) for a cycle.
///
/// Roots are visited in index order and edges in list order, so a caller that
/// numbers its nodes and sorts its edges gets the same answer every time.
/// The returned path starts and ends with the node where the back-edge landed,
/// e.g. `[a, b, a]`; a self-edge comes back as `[a, a]`.
///
/// Uses an explicit stack so long dependency chains can't overflow.
pub fn find_cycle(edges: &IdVec<NodeIdx, Vec<NodeIdx>>) -> Option<Vec<NodeIdx>> {
    let mut marks: IdVec<NodeIdx, Mark> = IdVec::fill(Mark::Unvisited, edges.len());
    // (node, index of next edge to follow)
    let mut stack: Vec<(NodeIdx, usize)> = Vec::with_capacity(16);

    for root in 0..edges.len() {
        let root = NodeIdx::from(root);
        if *marks.get(root) != Mark::Unvisited {
            continue;
        }
        *marks.get_mut(root) = Mark::InProgress;
        stack.push((root, 0));

        while let Some((top, next)) = stack.last_mut() {
            let top = *top;
            let out = edges.get(top);
            if *next >= out.len() {
                *marks.get_mut(top) = Mark::Done;
                stack.pop();
                continue;
            }
            let child = out[*next];
            *next += 1;

            match *marks.get(child) {
                Mark::Unvisited => {
                    *marks.get_mut(child) = Mark::InProgress;
                    stack.push((child, 0));
                }
                Mark::InProgress => {
                    let start = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                    let mut path: Vec<NodeIdx> = stack[start..].iter().map(|(n, _)| *n).collect();
                    path.push(child);
                    return Some(path);
                }
                Mark::Done => {}
            }
        }
    }
    None
}
