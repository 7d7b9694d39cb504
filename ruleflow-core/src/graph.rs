//! Directed graph over node ids.
//!
//! [`DiGraphBuilder`] is the mutable form used while a flow is assembled;
//! [`DiGraphBuilder::freeze`] turns it into a [`DiGraph`] that only offers
//! read access and is shared across runs.

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct DiGraphBuilder {
    nodes: Vec<String>,
    successors: HashMap<String, Vec<String>>,
    in_degree: HashMap<String, usize>,
}

impl DiGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex; returns `false` if it already existed.
    pub fn add_node(&mut self, id: &str) -> bool {
        if self.successors.contains_key(id) {
            return false;
        }
        self.nodes.push(id.to_string());
        self.successors.insert(id.to_string(), Vec::new());
        self.in_degree.insert(id.to_string(), 0);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.successors.contains_key(id)
    }

    /// Inserts `source -> target`, adding missing vertices.
    ///
    /// Parallel edges collapse; returns `false` when the edge was present.
    pub fn put_edge(&mut self, source: &str, target: &str) -> bool {
        self.add_node(source);
        self.add_node(target);

        let targets = self.successors.entry(source.to_string()).or_default();
        if targets.iter().any(|t| t == target) {
            return false;
        }
        targets.push(target.to_string());
        *self.in_degree.entry(target.to_string()).or_default() += 1;
        true
    }

    pub fn freeze(self) -> DiGraph {
        DiGraph {
            nodes: self.nodes,
            successors: self.successors,
            in_degree: self.in_degree,
        }
    }
}

/// Read-only view of a built graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiGraph {
    nodes: Vec<String>,
    successors: HashMap<String, Vec<String>>,
    in_degree: HashMap<String, usize>,
}

impl DiGraph {
    /// Vertices in insertion order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains(&self, id: &str) -> bool {
        self.successors.contains_key(id)
    }

    /// Successors in edge insertion order; empty for unknown ids.
    pub fn successors(&self, id: &str) -> &[String] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.in_degree.get(id).copied().unwrap_or(0)
    }

    /// Vertices without incoming edges, in insertion order.
    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|id| self.in_degree(id) == 0)
            .map(String::as_str)
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successors_keep_edge_order() {
        let mut builder = DiGraphBuilder::new();
        builder.put_edge("A", "C");
        builder.put_edge("A", "B");
        let graph = builder.freeze();

        assert_eq!(graph.successors("A"), ["C", "B"]);
        assert!(graph.successors("missing").is_empty());
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut builder = DiGraphBuilder::new();
        assert!(builder.put_edge("A", "B"));
        assert!(!builder.put_edge("A", "B"));
        let graph = builder.freeze();

        assert_eq!(graph.in_degree("B"), 1);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn roots_include_isolated_nodes() {
        let mut builder = DiGraphBuilder::new();
        builder.add_node("lonely");
        builder.put_edge("A", "B");
        let graph = builder.freeze();

        assert_eq!(graph.roots(), vec!["lonely", "A"]);
    }

    #[test]
    fn self_loop_counts_as_incoming() {
        let mut builder = DiGraphBuilder::new();
        builder.put_edge("A", "A");
        let graph = builder.freeze();

        assert_eq!(graph.in_degree("A"), 1);
        assert!(graph.roots().is_empty());
    }
}
