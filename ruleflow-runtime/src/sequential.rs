use crate::GraphProcessor;
use ruleflow_context::{NodeFailure, RuleContext};
use ruleflow_core::FlowGraph;
use std::sync::Arc;

/// Continues a run along a single successor on the caller's own context.
pub struct SequentialTaskExecutor<'p> {
    processor: &'p GraphProcessor,
}

impl<'p> SequentialTaskExecutor<'p> {
    pub fn new(processor: &'p GraphProcessor) -> Self {
        Self { processor }
    }

    pub async fn execute(
        &self,
        graph: &Arc<FlowGraph>,
        parent: &str,
        successor: &str,
        ctx: &mut RuleContext,
    ) -> Result<(), NodeFailure> {
        #[cfg(feature = "detailed-logging")]
        {
            tracing::info!(from = %parent, to = %successor, "顺序执行");
        }
        #[cfg(not(feature = "detailed-logging"))]
        tracing::trace!(from = %parent, to = %successor, "sequential step");

        self.processor
            .step_into(graph, parent, successor, ctx)
            .await
    }
}
