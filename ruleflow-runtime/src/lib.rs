//! # RuleFlow Runtime
//!
//! Graph processor for built flow graphs: sequential stepping along single
//! successors, fork/join at fan-out points, choice routing and the deferred
//! output node, plus a registry of deployed flows.

mod config;
mod parallel;
mod processor;
mod registry;
mod sequential;
#[cfg(feature = "perf-metrics")]
mod stats;


pub use config::ProcessorConfig;
pub use parallel::ParallelTaskExecutor;
pub use processor::{GraphProcessor, RunOutcome};
pub use registry::FlowRegistry;
pub use sequential::SequentialTaskExecutor;
#[cfg(feature = "perf-metrics")]
pub use stats::ProcessStats;
