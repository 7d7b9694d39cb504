use thiserror::Error;

/// Runtime failure stored in a context's error slot.
///
/// Kept `Clone` so a context can be copied into parallel branches with its
/// error slot intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeFailure {
    /// A choice condition raised while being evaluated.
    #[error("branch evaluation failed at node '{node_id}': {message}")]
    BranchEvaluation {
        node_id: String,
        message: String,
        trace_path: String,
    },
    /// Any other node executor failure.
    #[error("node '{node_id}' failed: {message}")]
    NodeExecution {
        node_id: String,
        message: String,
        trace_path: String,
    },
}

impl NodeFailure {
    pub fn branch_evaluation(
        node_id: impl Into<String>,
        message: impl Into<String>,
        trace_path: impl Into<String>,
    ) -> Self {
        Self::BranchEvaluation {
            node_id: node_id.into(),
            message: message.into(),
            trace_path: trace_path.into(),
        }
    }

    pub fn node_execution(
        node_id: impl Into<String>,
        message: impl Into<String>,
        trace_path: impl Into<String>,
    ) -> Self {
        Self::NodeExecution {
            node_id: node_id.into(),
            message: message.into(),
            trace_path: trace_path.into(),
        }
    }

    pub fn node_id(&self) -> &str {
        match self {
            Self::BranchEvaluation { node_id, .. }
            | Self::NodeExecution { node_id, .. } => node_id,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BranchEvaluation { message, .. }
            | Self::NodeExecution { message, .. } => message,
        }
    }

    /// Trace path of the context at the moment the failure was recorded.
    pub fn trace_path(&self) -> &str {
        match self {
            Self::BranchEvaluation { trace_path, .. }
            | Self::NodeExecution { trace_path, .. } => trace_path,
        }
    }
}
