//! Cycle detection over the command graph.
//!
//! Nodes are visited through the command that produces them; a node with no
//! producer ends the walk and is reported as unproduced.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::Command;
use crate::graph::traversal::canonicalize_cycle;

/// Tracks the visitation state of a node during cycle detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

pub(crate) struct CycleDetectionReport {
    pub(crate) cycle: Option<Vec<String>>,
    pub(crate) missing_dependencies: Vec<(String, String)>,
}

/// Walk every produced node.
///
/// `producers` maps node keys to the name of the command writing them.
pub(crate) fn analyse(
    producers: &IndexMap<String, String>,
    commands: &IndexMap<String, Command>,
) -> CycleDetectionReport {
    let mut detector = CycleDetector::new(producers, commands);
    let mut cycle = None;
    for node in producers.keys() {
        if detector.is_visited(node) {
            continue;
        }
        if let Some(found) = detector.visit(node) {
            cycle = Some(found);
            break;
        }
    }
    CycleDetectionReport {
        cycle,
        missing_dependencies: detector.missing_dependencies,
    }
}

struct CycleDetector<'a> {
    producers: &'a IndexMap<String, String>,
    commands: &'a IndexMap<String, Command>,
    stack: Vec<String>,
    states: HashMap<String, VisitState>,
    missing_dependencies: Vec<(String, String)>,
}

impl<'a> CycleDetector<'a> {
    fn new(
        producers: &'a IndexMap<String, String>,
        commands: &'a IndexMap<String, Command>,
    ) -> Self {
        Self {
            producers,
            commands,
            stack: Vec::new(),
            states: HashMap::new(),
            missing_dependencies: Vec::new(),
        }
    }

    fn is_visited(&self, node: &str) -> bool {
        matches!(self.states.get(node), Some(VisitState::Visited))
    }

    fn visit(&mut self, node: &str) -> Option<Vec<String>> {
        match self.states.get(node) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let idx = self.stack.iter().position(|n| n == node).unwrap_or(0);
                let mut cycle: Vec<String> = self.stack.iter().skip(idx).cloned().collect();
                cycle.push(node.to_owned());
                return Some(canonicalize_cycle(cycle));
            }
            None => {
                self.states.insert(node.to_owned(), VisitState::Visiting);
            }
        }

        self.stack.push(node.to_owned());

        let command = self
            .producers
            .get(node)
            .and_then(|name| self.commands.get(name));
        if let Some(command) = command {
            for input in &command.inputs {
                let key = input.key();
                if !self.producers.contains_key(&key) {
                    self.missing_dependencies.push((node.to_owned(), key));
                    continue;
                }
                if let Some(cycle) = self.visit(&key) {
                    return Some(cycle);
                }
            }
        }

        self.stack.pop();
        self.states.insert(node.to_owned(), VisitState::Visited);
        None
    }
}
