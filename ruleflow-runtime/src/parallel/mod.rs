use crate::GraphProcessor;
use ruleflow_context::{NodeFailure, RuleContext};
use ruleflow_core::FlowGraph;
use std::sync::Arc;
#[cfg(feature = "parallel")]
use tokio::task::JoinSet;


/// Fork/join over the successors of a fan-out node.
///
/// Every branch runs on its own copy of the context. The caller resumes only
/// after all branches have finished; their properties and step logs are then
/// merged back in completion order (last writer wins on colliding keys) and
/// the first branch failure in that order is recorded on the caller's
/// context. Branch bodies are discarded. Completed siblings of a failed
/// branch are not rolled back.
pub struct ParallelTaskExecutor<'p> {
    processor: &'p GraphProcessor,
}

impl<'p> ParallelTaskExecutor<'p> {
    pub fn new(processor: &'p GraphProcessor) -> Self {
        Self { processor }
    }

    #[tracing::instrument(level = "debug", skip(self, graph, ctx), fields(flow_id = %graph.flow_id()))]
    pub async fn execute(
        &self,
        graph: &Arc<FlowGraph>,
        parent: &str,
        successors: Vec<String>,
        ctx: &mut RuleContext,
    ) -> Result<(), NodeFailure> {
        if let Some(failure) = ctx.error().cloned() {
            for successor in &successors {
                self.processor.skip_pending(successor, ctx);
            }
            return Err(failure);
        }

        #[cfg(feature = "detailed-logging")]
        {
            tracing::info!(from = %parent, branches = successors.len(), "并行分叉");
        }

        #[cfg(feature = "parallel")]
        self.fork_join(graph, parent, successors, ctx).await;
        #[cfg(not(feature = "parallel"))]
        self.run_in_turn(graph, parent, successors, ctx).await;

        ctx.push_trace(parent);

        match ctx.error() {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    #[cfg(feature = "parallel")]
    async fn fork_join(
        &self,
        graph: &Arc<FlowGraph>,
        parent: &str,
        successors: Vec<String>,
        ctx: &mut RuleContext,
    ) {
        let mut join_set = JoinSet::new();

        for successor in successors {
            let processor = self.processor.clone();
            let graph = Arc::clone(graph);
            let parent = parent.to_string();
            let mut branch = ctx.fork();

            join_set.spawn(async move {
                let result = processor
                    .step_into(&graph, &parent, &successor, &mut branch)
                    .await;
                (successor, branch, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((successor, branch, result)) => {
                    if let Err(failure) = &result {
                        tracing::debug!(branch = %successor, error = %failure, "branch failed");
                    }
                    ctx.absorb_branch(branch);
                }
                Err(join_error) => {
                    let failure = NodeFailure::node_execution(
                        parent,
                        format!("Join error: {join_error}"),
                        ctx.trace_path.clone(),
                    );
                    ctx.record_error(failure);
                }
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    async fn run_in_turn(
        &self,
        graph: &Arc<FlowGraph>,
        parent: &str,
        successors: Vec<String>,
        ctx: &mut RuleContext,
    ) {
        let mut branches = Vec::with_capacity(successors.len());
        for successor in &successors {
            let mut branch = ctx.fork();
            if let Err(failure) = self
                .processor
                .step_into(graph, parent, successor, &mut branch)
                .await
            {
                tracing::debug!(branch = %successor, error = %failure, "branch failed");
            }
            branches.push(branch);
        }

        for branch in branches {
            ctx.absorb_branch(branch);
        }
    }
}
