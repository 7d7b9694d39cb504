use crate::compiler::intercept_node;
use crate::{
    ChoiceBranchMap, DiGraphBuilder, EdgeRecord, EntryNode, EntryNodeError, FlowGraph,
    NodeCompiler, NodeInterceptor, NodeRecord, Result, RuleFlowError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Builder that validates a flow definition and compiles it into a
/// [`FlowGraph`].
pub struct FlowGraphBuilder {
    flow_id: String,
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
    interceptors: Vec<Arc<dyn NodeInterceptor>>,
}

impl FlowGraphBuilder {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    pub fn node(mut self, node: NodeRecord) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn nodes(mut self, nodes: impl IntoIterator<Item = NodeRecord>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn edge(mut self, edge: EdgeRecord) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn edges(mut self, edges: impl IntoIterator<Item = EdgeRecord>) -> Self {
        self.edges.extend(edges);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn NodeInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Validates the definition and compiles every node.
    ///
    /// Fails without producing a partial graph if the definition has no
    /// unique entry node, if any node fails to compile, or if the structure
    /// is inconsistent.
    #[tracing::instrument(level = "info", skip_all, fields(flow_id = %self.flow_id, nodes = self.nodes.len(), edges = self.edges.len()))]
    pub fn build<C>(self, compiler: &C) -> Result<FlowGraph>
    where
        C: NodeCompiler + ?Sized,
    {
        let Self {
            flow_id,
            nodes,
            edges,
            mut interceptors,
        } = self;
        let invalid = |reason: String| RuleFlowError::InvalidDefinition {
            flow_id: flow_id.clone(),
            reason,
        };

        let mut builder = DiGraphBuilder::new();
        for node in &nodes {
            if !builder.add_node(&node.id) {
                return Err(invalid(format!("duplicate node id '{}'", node.id)));
            }
        }

        let mut branches = ChoiceBranchMap::default();
        for edge in &edges {
            for end in [&edge.source, &edge.target] {
                if !builder.contains(end) {
                    return Err(invalid(format!(
                        "edge {} -> {} references unknown node '{}'",
                        edge.source, edge.target, end
                    )));
                }
            }
            builder.put_edge(&edge.source, &edge.target);
            if let Some(label) = edge.label() {
                branches.insert(label, &edge.target);
            }
        }
        let graph = builder.freeze();

        let entry_id = match graph.roots().as_slice() {
            [entry] => entry.to_string(),
            [] => {
                return Err(RuleFlowError::EntryNode {
                    flow_id: flow_id.clone(),
                    source: EntryNodeError::Missing,
                })
            }
            roots => {
                return Err(RuleFlowError::EntryNode {
                    flow_id: flow_id.clone(),
                    source: EntryNodeError::Ambiguous(
                        roots.iter().map(|id| id.to_string()).collect(),
                    ),
                })
            }
        };

        interceptors.sort_by_key(|interceptor| interceptor.priority());

        let mut executors = HashMap::with_capacity(nodes.len());
        let mut entry = None;
        let mut outputs = Vec::new();
        for node in nodes {
            let node_id = node.id.clone();
            let compile_error = |source: anyhow::Error| RuleFlowError::Compile {
                node_id: node_id.clone(),
                source,
            };

            let (node, replacement) =
                intercept_node(&interceptors, node).map_err(compile_error)?;
            let mut executor = match replacement {
                Some(executor) => executor,
                None => compiler.compile(&node).map_err(compile_error)?,
            };
            if node.output {
                executor = executor.into_output();
                outputs.push(node.id.clone());
            }

            if node.id == entry_id {
                entry = Some(EntryNode {
                    record: node,
                    executor,
                });
            } else {
                executors.insert(node.id, executor);
            }
        }

        if outputs.len() > 1 {
            return Err(invalid(format!(
                "more than one output node: {}",
                outputs.join(", ")
            )));
        }
        let entry = entry.ok_or_else(|| invalid(format!("entry node '{entry_id}' was not compiled")))?;

        info!(
            flow_id = %flow_id,
            entry = %entry.id(),
            output = ?outputs.first(),
            branches = branches.len(),
            "flow graph built"
        );

        Ok(FlowGraph {
            flow_id,
            graph,
            executors,
            entry,
            output_node: outputs.pop(),
            branches,
        })
    }
}

impl FlowGraph {
    /// Builds a flow graph from node and edge records.
    pub fn build<C>(
        flow_id: impl Into<String>,
        nodes: Vec<NodeRecord>,
        edges: Vec<EdgeRecord>,
        compiler: &C,
    ) -> Result<FlowGraph>
    where
        C: NodeCompiler + ?Sized,
    {
        FlowGraphBuilder::new(flow_id)
            .nodes(nodes)
            .edges(edges)
            .build(compiler)
    }
}
