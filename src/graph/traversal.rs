//! Deterministic topological ordering with cycle detection.
//!
//! Nodes are visited depth-first in the order their roots and successors are
//! supplied, and emitted post-order, so every node appears after everything
//! it depends on. Revisiting a node that is still on the stack reports the
//! cycle instead of looping.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use super::GraphError;

/// Tracks the visitation state of a node during the walk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Order `roots` and everything reachable from them, dependencies first.
///
/// `key` identifies nodes; the first occurrence of a key wins. `successors`
/// yields a node's direct dependencies and may fail, aborting the walk.
///
/// # Errors
///
/// Returns [`GraphError::Cycle`] naming the canonicalised cycle when one is
/// reachable, or any error raised by `successors`.
pub fn topological_sort<T, K, FK, FS>(
    roots: impl IntoIterator<Item = T>,
    key: FK,
    successors: FS,
) -> Result<Vec<T>, GraphError>
where
    K: Eq + Hash + Clone + Display,
    FK: Fn(&T) -> K,
    FS: FnMut(&T) -> Result<Vec<T>, GraphError>,
{
    let mut sorter = Sorter {
        key,
        successors,
        states: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    for root in roots {
        sorter.visit(root)?;
    }
    Ok(sorter.order)
}

struct Sorter<T, K, FK, FS> {
    key: FK,
    successors: FS,
    states: HashMap<K, VisitState>,
    stack: Vec<K>,
    order: Vec<T>,
}

impl<T, K, FK, FS> Sorter<T, K, FK, FS>
where
    K: Eq + Hash + Clone + Display,
    FK: Fn(&T) -> K,
    FS: FnMut(&T) -> Result<Vec<T>, GraphError>,
{
    fn visit(&mut self, node: T) -> Result<(), GraphError> {
        let key = (self.key)(&node);
        match self.states.get(&key) {
            Some(VisitState::Visited) => return Ok(()),
            Some(VisitState::Visiting) => {
                let idx = self.stack.iter().position(|k| k == &key).unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.stack.iter().skip(idx).map(ToString::to_string).collect();
                cycle.push(key.to_string());
                return Err(GraphError::Cycle {
                    path: canonicalize_cycle(cycle),
                });
            }
            None => {
                self.states.insert(key.clone(), VisitState::Visiting);
            }
        }

        self.stack.push(key.clone());
        for successor in (self.successors)(&node)? {
            self.visit(successor)?;
        }
        self.stack.pop();

        self.states.insert(key, VisitState::Visited);
        self.order.push(node);
        Ok(())
    }
}

/// Rotate a closed cycle so it starts at its smallest element.
pub(crate) fn canonicalize_cycle(mut cycle: Vec<String>) -> Vec<String> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        slot.clone_from(&first);
    }
    cycle
}
