//! Dependency graph over `dependsOn` relations.
//!
//! The processors emit dependency edges without looking at the rest of the
//! graph. [`DependencyGraph`] is the opt-in check used when the edges are
//! needed for ordering, such as provisioning environments after the
//! providers they depend on.

use std::collections::{BTreeMap, BTreeSet};

use super::processor::{EntityRelation, ProcessingResult, RELATION_DEPENDS_ON};

/// Directed graph of entity references, `a -> b` meaning `a` depends on `b`
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let to = to.into();
        self.edges.entry(to.clone()).or_default();
        self.edges.entry(from.into()).or_default().insert(to);
    }

    /// Record a relation; only `dependsOn` relations become edges
    pub fn add_relation(&mut self, relation: &EntityRelation) {
        if relation.relation_type == RELATION_DEPENDS_ON {
            self.add_edge(relation.source.to_string(), relation.target.to_string());
        }
    }

    pub fn extend_from_results<'a>(&mut self, results: impl IntoIterator<Item = &'a ProcessingResult>) {
        for result in results {
            let ProcessingResult::Relation { relation } = result;
            self.add_relation(relation);
        }
    }

    /// Whether adding `from -> to` would close a cycle
    #[must_use]
    pub fn would_cycle(&self, from: &str, to: &str) -> bool {
        from == to || self.path_exists(to, from)
    }

    fn path_exists(&self, start: &str, goal: &str) -> bool {
        let mut stack = vec![start];
        let mut seen = BTreeSet::new();
        while let Some(node) = stack.pop() {
            if node == goal {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = self.edges.get(node) {
                stack.extend(next.iter().map(String::as_str));
            }
        }
        false
    }

    /// One cycle in the graph, first node repeated at the end
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
        let mut path: Vec<&str> = Vec::new();
        for node in self.edges.keys() {
            if marks.contains_key(node.as_str()) {
                continue;
            }
            if let Some(cycle) = self.visit(node, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        marks: &mut BTreeMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Visiting);
        path.push(node);
        for next in self.edges.get(node).into_iter().flatten() {
            match marks.get(next.as_str()) {
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|n| *n == next.as_str())?;
                    let mut cycle: Vec<String> = path[start..].iter().map(|n| (*n).to_string()).collect();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(cycle) = self.visit(next, marks, path) {
                        return Some(cycle);
                    }
                }
            }
        }
        path.pop();
        marks.insert(node, Mark::Done);
        None
    }

    /// Nodes ordered so that dependencies come before their dependents
    ///
    /// Returns the offending cycle when no such order exists.
    pub fn provisioning_order(&self) -> Result<Vec<String>, Vec<String>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(cycle);
        }
        let mut order = Vec::with_capacity(self.edges.len());
        let mut placed = BTreeSet::new();
        for node in self.edges.keys() {
            self.place(node, &mut placed, &mut order);
        }
        Ok(order)
    }

    fn place<'a>(&'a self, node: &'a str, placed: &mut BTreeSet<&'a str>, order: &mut Vec<String>) {
        if !placed.insert(node) {
            return;
        }
        for dep in self.edges.get(node).into_iter().flatten() {
            self.place(dep, placed, order);
        }
        order.push(node.to_string());
    }
}
