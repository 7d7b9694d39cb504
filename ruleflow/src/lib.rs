//! # RuleFlow - Graph-Driven Rule Workflow Engine
//!
//! RuleFlow turns a declarative set of node and edge records into an
//! immutable flow graph and runs messages through it: single successors are
//! followed in place, fan-out points fork and join, choice nodes route by
//! condition and the output node runs once at the end.
//!
//! ## Features
//!
//! - `core` (always available): flow graph model and builder
//! - `runtime` (default): graph processor and flow registry
//! - `logger` (default): tracing subscriber bootstrap and run summaries
//! - `parallel` (default): fork/join branches run as concurrent tasks
//! - `perf-metrics` (default): processor run statistics
//! - `detailed-logging`: per-node info logs
//!
//! ## Quick Start
//!
//! ```rust
//! use ruleflow::prelude::*;
//! use serde_json::json;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let compiler = ComponentRegistry::new().register_action(
//!         "greet",
//!         action_fn(|ctx| {
//!             ctx.set_property("greeting", "hello");
//!             Ok(())
//!         }),
//!     );
//!     let graph = Arc::new(FlowGraph::build(
//!         "hello",
//!         vec![NodeRecord::new("A", "greet"), NodeRecord::new("B", "greet")],
//!         vec![EdgeRecord::new("A", "B")],
//!         &compiler,
//!     )?);
//!
//!     let outcome = GraphProcessor::new()
//!         .run(&graph, json!({}), HashMap::new())
//!         .await;
//!     assert!(outcome.is_success());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export core functionality
pub use ruleflow_context as context;
pub use ruleflow_core::*;

#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub use ruleflow_runtime as runtime;

#[cfg(feature = "logger")]
#[cfg_attr(docsrs, doc(cfg(feature = "logger")))]
pub use ruleflow_logger as logger;

/// Prelude module for easy imports
pub mod prelude {
    pub use ruleflow_context::StepStatus;
    pub use ruleflow_core::prelude::*;
    pub use ruleflow_core::{Condition, Expression, Interception, NodeInterceptor};

    #[cfg(feature = "runtime")]
    #[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
    pub use ruleflow_runtime::{FlowRegistry, GraphProcessor, ProcessorConfig, RunOutcome};

    // 细粒度子特性透传
    #[cfg(all(feature = "runtime", feature = "perf-metrics"))]
    pub use ruleflow_runtime::ProcessStats;

    #[cfg(feature = "logger")]
    #[cfg_attr(docsrs, doc(cfg(feature = "logger")))]
    pub use ruleflow_logger::{Logger, RunSummary};
}
