//! # RuleFlow Context
//!
//! Per-run execution state threaded through every node of a flow graph.
//!
//! A [`RuleContext`] is owned by exactly one path of execution at a time.
//! Parallel branches never share one: the processor copies it for every
//! branch with [`RuleContext::fork`] and folds the branches back with
//! [`RuleContext::absorb_branch`].

mod failure;

pub use failure::NodeFailure;

use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// Separator between node ids in a trace path.
pub const TRACE_SEPARATOR: char = '-';

/// Mutable carrier of message, properties, trace and error for one run.
///
/// Cloning copies every field by value (the body is deep-copied), so
/// mutations on a clone are invisible to the original.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub context_id: String,
    pub body: Value,
    pub properties: HashMap<String, String>,
    pub trace_path: String,
    pub step_logs: Vec<StepLog>,
    error: Option<NodeFailure>,
    reached_output: bool,
    branch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StepLog {
    pub node_id: String,
    pub start_time: Instant,
    pub end_time: Option<Instant>,
    pub status: StepStatus,
    pub error_message: Option<String>,
    pub trace_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Success,
    Failed,
    Skipped,
}

impl Default for RuleContext {
    fn default() -> Self {
        Self::new_with_context_id(Uuid::new_v4().to_string(), Value::Null)
    }
}

impl RuleContext {
    /// Fresh context with a random id around `body`.
    pub fn new(body: Value) -> Self {
        Self::new_with_context_id(Uuid::new_v4().to_string(), body)
    }

    pub fn new_with_context_id(context_id: String, body: Value) -> Self {
        Self {
            trace_path: context_id.clone(),
            context_id,
            body,
            properties: HashMap::new(),
            step_logs: Vec::new(),
            error: None,
            reached_output: false,
            branch: None,
        }
    }

    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        tracing::debug!(context_id = %self.context_id, key = %key, value = %value, "set property");

        self.properties.insert(key, value);
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    /// Appends `node_id` to the trace path.
    pub fn push_trace(&mut self, node_id: &str) {
        self.trace_path.push(TRACE_SEPARATOR);
        self.trace_path.push_str(node_id);
    }

    pub fn error(&self) -> Option<&NodeFailure> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Stores `failure` unless an earlier one is already recorded.
    ///
    /// Returns `true` when the slot was empty.
    pub fn record_error(&mut self, failure: NodeFailure) -> bool {
        if self.error.is_some() {
            tracing::debug!(context_id = %self.context_id, ignored = %failure, "error slot already set");
            return false;
        }
        self.error = Some(failure);
        true
    }

    pub fn reached_output(&self) -> bool {
        self.reached_output
    }

    pub fn mark_output_reached(&mut self) {
        self.reached_output = true;
    }

    /// Branch marker written by a choice executor.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn set_branch(&mut self, label: impl Into<String>) {
        self.branch = Some(label.into());
    }

    pub fn clear_branch(&mut self) {
        self.branch = None;
    }

    /// Reads and clears the branch marker.
    pub fn take_branch(&mut self) -> Option<String> {
        self.branch.take()
    }

    /// Copy of this context for one parallel branch.
    ///
    /// Identical to a clone except that the step log starts empty, so that
    /// [`RuleContext::absorb_branch`] appends only the branch's own steps.
    pub fn fork(&self) -> RuleContext {
        RuleContext {
            context_id: self.context_id.clone(),
            body: self.body.clone(),
            properties: self.properties.clone(),
            trace_path: self.trace_path.clone(),
            step_logs: Vec::new(),
            error: self.error.clone(),
            reached_output: self.reached_output,
            branch: self.branch.clone(),
        }
    }

    /// Folds a finished parallel branch back into this context.
    ///
    /// Properties overwrite existing keys, step logs are appended, the
    /// output flag is or-ed, and the branch error is kept only if this
    /// context has none yet. The branch body is discarded.
    pub fn absorb_branch(&mut self, branch: RuleContext) {
        self.properties.extend(branch.properties);
        self.step_logs.extend(branch.step_logs);
        self.reached_output |= branch.reached_output;
        if let Some(failure) = branch.error {
            self.record_error(failure);
        }
    }

    /// Node ids of the recorded steps, in recording order.
    pub fn visited_nodes(&self) -> Vec<&str> {
        self.step_logs.iter().map(|log| log.node_id.as_str()).collect()
    }

    pub fn start_step(&mut self, node_id: &str) {
        self.step_logs.push(StepLog {
            node_id: node_id.to_string(),
            start_time: Instant::now(),
            end_time: None,
            status: StepStatus::Running,
            error_message: None,
            trace_path: self.trace_path.clone(),
        });

        tracing::debug!(context_id = %self.context_id, node = %node_id, trace = %self.trace_path, "step starting");
    }

    pub fn end_step_success(&mut self, node_id: &str) {
        if let Some(log) = self.running_step(node_id) {
            let end = Instant::now();
            log.end_time = Some(end);
            log.status = StepStatus::Success;
            let duration = end.duration_since(log.start_time);

            tracing::debug!(node = %node_id, duration_ms = ?duration, "step success");
        }
    }

    pub fn end_step_failed(&mut self, node_id: &str, error: &str) {
        if let Some(log) = self.running_step(node_id) {
            let end = Instant::now();
            log.end_time = Some(end);
            log.status = StepStatus::Failed;
            log.error_message = Some(error.to_string());
            let duration = end.duration_since(log.start_time);

            tracing::error!(node = %node_id, duration_ms = ?duration, error = %error, "step failed");
        }
    }

    pub fn end_step_skipped(&mut self, node_id: &str, reason: &str) {
        if let Some(log) = self.running_step(node_id) {
            let end = Instant::now();
            log.end_time = Some(end);
            log.status = StepStatus::Skipped;
            log.error_message = Some(reason.to_string());

            tracing::warn!(node = %node_id, reason = %reason, "step skipped");
        }
    }

    fn running_step(&mut self, node_id: &str) -> Option<&mut StepLog> {
        self.step_logs
            .iter_mut()
            .rev()
            .find(|log| log.node_id == node_id && log.status == StepStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trace_path_starts_at_context_id() {
        let mut ctx = RuleContext::new_with_context_id("ctx".into(), Value::Null);
        assert_eq!(ctx.trace_path, "ctx");

        ctx.push_trace("A");
        ctx.push_trace("B");
        assert_eq!(ctx.trace_path, "ctx-A-B");
    }

    #[test]
    fn first_error_wins() {
        let mut ctx = RuleContext::default();
        assert!(ctx.record_error(NodeFailure::node_execution("A", "boom", "t")));
        assert!(!ctx.record_error(NodeFailure::node_execution("B", "later", "t")));
        assert_eq!(ctx.error().map(NodeFailure::node_id), Some("A"));
    }

    #[test]
    fn clone_is_independent() {
        let mut ctx = RuleContext::new(json!({"n": 1}));
        ctx.set_property("k", "v");

        let mut copy = ctx.clone();
        copy.body["n"] = json!(2);
        copy.set_property("k", "changed");

        assert_eq!(ctx.body["n"], json!(1));
        assert_eq!(ctx.property("k"), Some("v"));
    }

    #[test]
    fn absorb_branch_merges_properties_but_not_body() {
        let mut parent = RuleContext::new(json!("parent"));
        parent.set_property("shared", "parent");

        let mut branch = parent.clone();
        branch.body = json!("branch");
        branch.set_property("only_branch", "1");
        branch.mark_output_reached();
        branch.record_error(NodeFailure::node_execution("X", "bad", "p"));

        parent.absorb_branch(branch);

        assert_eq!(parent.body, json!("parent"));
        assert_eq!(parent.property("only_branch"), Some("1"));
        assert!(parent.reached_output());
        assert_eq!(parent.error().map(NodeFailure::node_id), Some("X"));
    }

    #[test]
    fn fork_starts_with_empty_step_log() {
        let mut parent = RuleContext::new(json!({"n": 1}));
        parent.start_step("A");
        parent.end_step_success("A");

        let mut branch = parent.fork();
        assert!(branch.step_logs.is_empty());
        assert_eq!(branch.trace_path, parent.trace_path);
        assert_eq!(branch.body, parent.body);

        branch.start_step("B");
        branch.end_step_success("B");
        parent.absorb_branch(branch);
        assert_eq!(parent.visited_nodes(), vec!["A", "B"]);
    }

    #[test]
    fn take_branch_clears_marker() {
        let mut ctx = RuleContext::default();
        ctx.set_branch("L1");
        assert_eq!(ctx.take_branch().as_deref(), Some("L1"));
        assert!(ctx.branch().is_none());
    }

    #[test]
    fn step_logs_track_status() {
        let mut ctx = RuleContext::default();
        ctx.start_step("A");
        ctx.end_step_success("A");
        ctx.start_step("B");
        ctx.end_step_failed("B", "nope");
        ctx.start_step("C");
        ctx.end_step_skipped("C", "pending error from B");

        assert_eq!(ctx.visited_nodes(), vec!["A", "B", "C"]);
        assert_eq!(ctx.step_logs[0].status, StepStatus::Success);
        assert_eq!(ctx.step_logs[1].status, StepStatus::Failed);
        assert_eq!(ctx.step_logs[1].error_message.as_deref(), Some("nope"));
        assert_eq!(ctx.step_logs[2].status, StepStatus::Skipped);
        assert_eq!(ctx.step_logs[2].error_message.as_deref(), Some("pending error from B"));
    }
}
