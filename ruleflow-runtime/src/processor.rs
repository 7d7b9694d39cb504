//! # RuleFlow Runtime - 图处理器
//!
//! Walks a [`FlowGraph`] from its entry node, dispatching every step to the
//! sequential or the fork/join executor depending on the number of resolved
//! successors.

use crate::config::ProcessorConfig;
use crate::parallel::ParallelTaskExecutor;
use crate::sequential::SequentialTaskExecutor;
#[cfg(feature = "perf-metrics")]
use crate::stats::{ProcessStats, StatsRecorder};
use futures::future::BoxFuture;
use ruleflow_context::{NodeFailure, RuleContext};
use ruleflow_core::{FlowGraph, NodeExecutor, RuleFlowError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Final state of one run, as handed back to callers that only need the
/// message and properties.
#[derive(Debug)]
pub struct RunOutcome {
    pub body: Value,
    pub properties: HashMap<String, String>,
    pub trace_path: String,
    pub error: Option<RuleFlowError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into a `Result`, dropping the partial state of a failed run.
    pub fn into_result(self) -> Result<(Value, HashMap<String, String>), RuleFlowError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.body, self.properties)),
        }
    }
}

/// Runtime driver of flow graphs.
///
/// Cheap to clone; clones share configuration, the concurrency limit and
/// statistics. One processor may run any number of graphs concurrently.
#[derive(Clone)]
pub struct GraphProcessor {
    inner: Arc<ProcessorInner>,
}

struct ProcessorInner {
    config: ProcessorConfig,
    /// 并发控制信号量
    permits: Option<Semaphore>,
    #[cfg(feature = "perf-metrics")]
    stats: StatsRecorder,
}

impl Default for GraphProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphProcessor {
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    pub fn with_config(config: ProcessorConfig) -> Self {
        let permits = config.max_concurrency.map(|limit| Semaphore::new(limit.max(1)));
        Self {
            inner: Arc::new(ProcessorInner {
                config,
                permits,
                #[cfg(feature = "perf-metrics")]
                stats: StatsRecorder::default(),
            }),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.inner.config
    }

    #[cfg(feature = "perf-metrics")]
    pub fn stats(&self) -> ProcessStats {
        self.inner.stats.snapshot()
    }

    /// Runs `graph` on `ctx` and returns the final context.
    ///
    /// A failure is recorded on the context before it is returned; the
    /// context itself is dropped in that case. Use [`Self::process_with`]
    /// or [`Self::run`] to keep the partial state of a failed run.
    pub async fn process(
        &self,
        graph: &Arc<FlowGraph>,
        ctx: RuleContext,
    ) -> Result<RuleContext, RuleFlowError> {
        let (ctx, error) = self.execute(graph, ctx).await;
        match error {
            Some(error) => Err(error),
            None => Ok(ctx),
        }
    }

    /// Like [`Self::process`], but hands the final context and the optional
    /// error to `on_complete` before returning.
    pub async fn process_with<F>(
        &self,
        graph: &Arc<FlowGraph>,
        ctx: RuleContext,
        on_complete: F,
    ) -> Result<RuleContext, RuleFlowError>
    where
        F: FnOnce(&RuleContext, Option<&RuleFlowError>),
    {
        let (ctx, error) = self.execute(graph, ctx).await;
        on_complete(&ctx, error.as_ref());
        match error {
            Some(error) => Err(error),
            None => Ok(ctx),
        }
    }

    /// Runs `graph` on a fresh context built from `body` and `properties`.
    pub async fn run(
        &self,
        graph: &Arc<FlowGraph>,
        body: Value,
        properties: HashMap<String, String>,
    ) -> RunOutcome {
        let ctx = RuleContext::new(body).with_properties(properties);
        let (ctx, error) = self.execute(graph, ctx).await;
        RunOutcome {
            body: ctx.body,
            properties: ctx.properties,
            trace_path: ctx.trace_path,
            error,
        }
    }

    #[tracing::instrument(
        level = "info",
        skip(self, graph, ctx),
        fields(flow_id = %graph.flow_id(), context_id = %ctx.context_id)
    )]
    async fn execute(
        &self,
        graph: &Arc<FlowGraph>,
        mut ctx: RuleContext,
    ) -> (RuleContext, Option<RuleFlowError>) {
        let entry_id = graph.entry().id();

        #[cfg(feature = "detailed-logging")]
        {
            tracing::info!(entry = %entry_id, nodes = graph.node_count(), "开始执行流程");
        }

        let mut result = match self.execute_node(graph, entry_id, &mut ctx).await {
            Ok(()) => self.walk(graph, entry_id, &mut ctx).await,
            Err(failure) => Err(failure),
        };

        match graph.output_node() {
            Some(output_id) if ctx.reached_output() && result.is_ok() => {
                tracing::debug!(node_id = %output_id, "running output node");
                result = self.execute_node(graph, output_id, &mut ctx).await;
            }
            Some(output_id) if ctx.reached_output() => {
                self.skip_pending(output_id, &mut ctx);
            }
            _ => {}
        }

        // the context slot holds the first failure in join order
        let error = match (ctx.error(), result) {
            (Some(failure), _) => Some(RuleFlowError::from(failure.clone())),
            (None, Err(failure)) => Some(RuleFlowError::from(failure)),
            (None, Ok(())) => None,
        };

        #[cfg(feature = "perf-metrics")]
        self.inner.stats.run_finished(error.is_some());

        match &error {
            Some(error) => {
                tracing::error!(trace_path = %ctx.trace_path, error = %error, "flow run failed")
            }
            None => tracing::info!(trace_path = %ctx.trace_path, "flow run completed"),
        }

        (ctx, error)
    }

    /// Resolves the successors of `current` and steps into them.
    pub(crate) fn walk<'a>(
        &'a self,
        graph: &'a Arc<FlowGraph>,
        current: &'a str,
        ctx: &'a mut RuleContext,
    ) -> BoxFuture<'a, Result<(), NodeFailure>> {
        Box::pin(async move {
            let successors = resolve_successors(graph, current, ctx);

            match successors.len() {
                0 => {
                    tracing::debug!(node_id = %current, "no successors, path ends");
                    Ok(())
                }
                1 => {
                    SequentialTaskExecutor::new(self)
                        .execute(graph, current, &successors[0], ctx)
                        .await
                }
                _ => {
                    #[cfg(feature = "perf-metrics")]
                    self.inner.stats.forked();

                    ParallelTaskExecutor::new(self)
                        .execute(graph, current, successors, ctx)
                        .await
                }
            }
        })
    }

    /// One hop from `parent` into `successor`, then onwards.
    pub(crate) async fn step_into(
        &self,
        graph: &Arc<FlowGraph>,
        parent: &str,
        successor: &str,
        ctx: &mut RuleContext,
    ) -> Result<(), NodeFailure> {
        if let Some(failure) = self.skip_pending(successor, ctx) {
            return Err(failure);
        }

        ctx.push_trace(parent);

        if graph.is_output(successor) {
            // runs once after traversal
            ctx.mark_output_reached();
            return Ok(());
        }

        self.execute_node(graph, successor, ctx).await?;
        self.walk(graph, successor, ctx).await
    }

    /// Returns the pending error of `ctx`, if any, logging `node_id` as a
    /// skipped step.
    pub(crate) fn skip_pending(&self, node_id: &str, ctx: &mut RuleContext) -> Option<NodeFailure> {
        let failure = ctx.error()?.clone();
        tracing::debug!(node_id = %node_id, failed_node = %failure.node_id(), "pending error, skipping");

        if self.inner.config.record_steps {
            ctx.start_step(node_id);
            ctx.end_step_skipped(node_id, &format!("pending error from {}", failure.node_id()));
        }
        Some(failure)
    }

    /// Invokes the executor of `node_id`, recording a failure on `ctx`.
    async fn execute_node(
        &self,
        graph: &Arc<FlowGraph>,
        node_id: &str,
        ctx: &mut RuleContext,
    ) -> Result<(), NodeFailure> {
        if let Some(failure) = self.skip_pending(node_id, ctx) {
            return Err(failure);
        }

        let Some(executor) = graph.executor(node_id) else {
            let failure = NodeFailure::node_execution(
                node_id,
                "no executor compiled for node",
                ctx.trace_path.clone(),
            );
            ctx.record_error(failure.clone());
            return Err(failure);
        };

        let _permit = self.acquire(node_id, ctx).await?;
        let record_steps = self.inner.config.record_steps;

        #[cfg(feature = "detailed-logging")]
        {
            tracing::info!(node_id = %node_id, kind = ?executor.kind(), trace_path = %ctx.trace_path, "执行节点");
        }

        if record_steps {
            ctx.start_step(node_id);
        }

        let result = match executor {
            NodeExecutor::Plain(action) | NodeExecutor::Output(action) => {
                action.execute(ctx).await.map_err(|e| {
                    NodeFailure::node_execution(node_id, format!("{e:#}"), ctx.trace_path.clone())
                })
            }
            NodeExecutor::Choice(choice) => choice.evaluate(node_id, ctx).map(|label| {
                tracing::debug!(node_id = %node_id, branch = %label, "branch selected");
            }),
        };

        #[cfg(feature = "perf-metrics")]
        self.inner.stats.node_executed();

        match &result {
            Ok(()) => {
                if record_steps {
                    ctx.end_step_success(node_id);
                }
            }
            Err(failure) => {
                ctx.record_error(failure.clone());
                if record_steps {
                    ctx.end_step_failed(node_id, failure.message());
                }
            }
        }

        result
    }

    async fn acquire(
        &self,
        node_id: &str,
        ctx: &mut RuleContext,
    ) -> Result<Option<SemaphorePermit<'_>>, NodeFailure> {
        let Some(permits) = &self.inner.permits else {
            return Ok(None);
        };

        match permits.acquire().await {
            Ok(permit) => Ok(Some(permit)),
            Err(e) => {
                let failure = NodeFailure::node_execution(
                    node_id,
                    format!("Failed to acquire semaphore permit: {e}"),
                    ctx.trace_path.clone(),
                );
                ctx.record_error(failure.clone());
                Err(failure)
            }
        }
    }
}

/// Choice nodes follow the branch marker; every other node follows its
/// graph edges. The marker is consumed here.
fn resolve_successors(graph: &FlowGraph, current: &str, ctx: &mut RuleContext) -> Vec<String> {
    match graph.executor(current) {
        Some(NodeExecutor::Choice(_)) => match ctx.take_branch() {
            Some(label) if !label.is_empty() => graph.branches().targets(&label).to_vec(),
            _ => Vec::new(),
        },
        _ => graph.successors(current).to_vec(),
    }
}
