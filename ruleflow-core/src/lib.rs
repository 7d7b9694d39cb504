//! # RuleFlow Core
//!
//! Flow graph model: node and edge records, the graph structure, node
//! executors (plain, choice, output), the node compiler and the builder that
//! turns a definition into an immutable [`FlowGraph`].

#![cfg_attr(docsrs, feature(doc_cfg))]

mod choice;
mod compiler;
mod condition;
mod error;
mod executor;
mod flow_graph;
mod flow_graph_builder;
mod graph;
mod record;


pub use choice::{ChoiceBranch, ChoiceExecutor};
pub use compiler::{
    ComponentFactory, ComponentRegistry, Interception, NodeCompiler, NodeInterceptor,
    CHOICE_COMPONENT,
};
pub use condition::{Condition, Expression};
pub use error::{EntryNodeError, Result, RuleFlowError};
pub use executor::{action_fn, ExecutorKind, NodeAction, NodeExecutor};
pub use flow_graph::{ChoiceBranchMap, EntryNode, FlowGraph};
pub use flow_graph_builder::FlowGraphBuilder;
pub use graph::{DiGraph, DiGraphBuilder};
pub use record::{EdgeRecord, NodeRecord};

/// Prelude module for core functionality
pub mod prelude {
    pub use crate::{
        action_fn, ChoiceExecutor, ComponentRegistry, EdgeRecord, FlowGraph, FlowGraphBuilder,
        NodeAction, NodeCompiler, NodeExecutor, NodeRecord, RuleFlowError,
    };
    pub use ruleflow_context::{NodeFailure, RuleContext};
}
