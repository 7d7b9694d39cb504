use crate::{DiGraph, NodeExecutor, NodeRecord};
use std::collections::HashMap;

/// Branch label to successor ids, in edge order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceBranchMap {
    targets: HashMap<String, Vec<String>>,
}

impl ChoiceBranchMap {
    pub(crate) fn insert(&mut self, label: &str, target: &str) {
        let targets = self.targets.entry(label.to_string()).or_default();
        if !targets.iter().any(|t| t == target) {
            targets.push(target.to_string());
        }
    }

    /// Successors for `label`; empty when the label has none.
    pub fn targets(&self, label: &str) -> &[String] {
        self.targets.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// The node without incoming edges; it triggers every run.
#[derive(Debug, Clone)]
pub struct EntryNode {
    pub record: NodeRecord,
    pub executor: NodeExecutor,
}

impl EntryNode {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Immutable, shareable result of building a flow definition.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    pub(crate) flow_id: String,
    pub(crate) graph: DiGraph,
    pub(crate) executors: HashMap<String, NodeExecutor>,
    pub(crate) entry: EntryNode,
    pub(crate) output_node: Option<String>,
    pub(crate) branches: ChoiceBranchMap,
}

impl FlowGraph {
    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn graph(&self) -> &DiGraph {
        &self.graph
    }

    pub fn entry(&self) -> &EntryNode {
        &self.entry
    }

    pub fn output_node(&self) -> Option<&str> {
        self.output_node.as_deref()
    }

    pub fn is_output(&self, node_id: &str) -> bool {
        self.output_node.as_deref() == Some(node_id)
    }

    pub fn branches(&self) -> &ChoiceBranchMap {
        &self.branches
    }

    /// Executor for `node_id`, including the entry node's.
    pub fn executor(&self, node_id: &str) -> Option<&NodeExecutor> {
        if node_id == self.entry.id() {
            return Some(&self.entry.executor);
        }
        self.executors.get(node_id)
    }

    pub fn output_executor(&self) -> Option<&NodeExecutor> {
        self.output_node
            .as_deref()
            .and_then(|id| self.executor(id))
    }

    /// Raw graph successors of `node_id`.
    pub fn successors(&self, node_id: &str) -> &[String] {
        self.graph.successors(node_id)
    }

    /// Number of compiled nodes, entry included.
    pub fn node_count(&self) -> usize {
        self.executors.len() + 1
    }
}
