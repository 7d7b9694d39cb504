//! Deployed flows keyed by flow id.

use crate::{GraphProcessor, RunOutcome};
use anyhow::{anyhow, Result};
use ruleflow_core::{
    EdgeRecord, FlowGraph, FlowGraphBuilder, NodeCompiler, NodeInterceptor, NodeRecord,
    RuleFlowError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds, stores and runs flow graphs.
///
/// Deployed graphs are immutable; redeploying a flow id swaps in a freshly
/// built graph while runs that already hold the previous one finish on it.
pub struct FlowRegistry {
    compiler: Arc<dyn NodeCompiler>,
    interceptors: Vec<Arc<dyn NodeInterceptor>>,
    processor: GraphProcessor,
    flows: RwLock<HashMap<String, Arc<FlowGraph>>>,
}

impl FlowRegistry {
    pub fn new(compiler: Arc<dyn NodeCompiler>) -> Self {
        Self {
            compiler,
            interceptors: Vec::new(),
            processor: GraphProcessor::new(),
            flows: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_processor(mut self, processor: GraphProcessor) -> Self {
        self.processor = processor;
        self
    }

    /// Adds an interceptor applied to every subsequent deployment.
    pub fn interceptor(mut self, interceptor: Arc<dyn NodeInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn processor(&self) -> &GraphProcessor {
        &self.processor
    }

    /// Builds the definition and stores it under `flow_id`, replacing any
    /// previous deployment. A failed build leaves the registry unchanged.
    pub async fn deploy(
        &self,
        flow_id: &str,
        nodes: Vec<NodeRecord>,
        edges: Vec<EdgeRecord>,
    ) -> Result<Arc<FlowGraph>, RuleFlowError> {
        let builder = self
            .interceptors
            .iter()
            .cloned()
            .fold(FlowGraphBuilder::new(flow_id), FlowGraphBuilder::interceptor)
            .nodes(nodes)
            .edges(edges);
        let graph = Arc::new(builder.build(self.compiler.as_ref())?);

        let previous = self
            .flows
            .write()
            .await
            .insert(flow_id.to_string(), Arc::clone(&graph));
        tracing::info!(flow_id = %flow_id, redeployed = previous.is_some(), "flow deployed");

        Ok(graph)
    }

    pub async fn remove(&self, flow_id: &str) -> Option<Arc<FlowGraph>> {
        let removed = self.flows.write().await.remove(flow_id);
        if removed.is_some() {
            tracing::info!(flow_id = %flow_id, "flow removed");
        }
        removed
    }

    pub async fn get(&self, flow_id: &str) -> Option<Arc<FlowGraph>> {
        self.flows.read().await.get(flow_id).cloned()
    }

    pub async fn flow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.flows.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Runs the deployed flow `flow_id`; fails only if it is not deployed.
    pub async fn execute(
        &self,
        flow_id: &str,
        body: Value,
        properties: HashMap<String, String>,
    ) -> Result<RunOutcome> {
        let graph = self
            .get(flow_id)
            .await
            .ok_or_else(|| anyhow!("flow '{flow_id}' is not deployed"))?;

        Ok(self.processor.run(&graph, body, properties).await)
    }
}
