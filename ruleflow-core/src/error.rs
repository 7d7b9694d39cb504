use ruleflow_context::NodeFailure;
use thiserror::Error;

/// Errors raised while building or running a flow graph.
#[derive(Debug, Error)]
pub enum RuleFlowError {
    #[error("flow '{flow_id}': {source}")]
    EntryNode {
        flow_id: String,
        #[source]
        source: EntryNodeError,
    },

    #[error("failed to compile node '{node_id}': {source:#}")]
    Compile {
        node_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid definition for flow '{flow_id}': {reason}")]
    InvalidDefinition { flow_id: String, reason: String },

    #[error("branch evaluation failed at node '{node_id}' (trace {trace_path}): {message}")]
    BranchEvaluation {
        node_id: String,
        message: String,
        trace_path: String,
    },

    #[error("node '{node_id}' failed (trace {trace_path}): {message}")]
    NodeExecution {
        node_id: String,
        message: String,
        trace_path: String,
    },
}

/// Why no unique entry node could be chosen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryNodeError {
    #[error("no start node found")]
    Missing,
    #[error("ambiguous entry, nodes without incoming edges: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
}

impl RuleFlowError {
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::EntryNode { .. } | Self::Compile { .. } | Self::InvalidDefinition { .. }
        )
    }

    /// Node the error is attributed to, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::Compile { node_id, .. }
            | Self::BranchEvaluation { node_id, .. }
            | Self::NodeExecution { node_id, .. } => Some(node_id),
            Self::EntryNode { .. } | Self::InvalidDefinition { .. } => None,
        }
    }

    /// Trace accumulated up to a runtime failure.
    pub fn trace_path(&self) -> Option<&str> {
        match self {
            Self::BranchEvaluation { trace_path, .. } | Self::NodeExecution { trace_path, .. } => {
                Some(trace_path)
            }
            _ => None,
        }
    }
}

impl From<NodeFailure> for RuleFlowError {
    fn from(failure: NodeFailure) -> Self {
        match failure {
            NodeFailure::BranchEvaluation {
                node_id,
                message,
                trace_path,
            } => Self::BranchEvaluation {
                node_id,
                message,
                trace_path,
            },
            NodeFailure::NodeExecution {
                node_id,
                message,
                trace_path,
            } => Self::NodeExecution {
                node_id,
                message,
                trace_path,
            },
        }
    }
}

pub type Result<T, E = RuleFlowError> = std::result::Result<T, E>;
