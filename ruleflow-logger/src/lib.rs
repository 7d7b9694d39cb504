//! # RuleFlow Logger
//!
//! Subscriber bootstrap and run summaries for RuleFlow

use ruleflow_context::{RuleContext, StepStatus};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Step counts of one finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_steps: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub running: usize,
}

impl RunSummary {
    pub fn from_context(context: &RuleContext) -> Self {
        context
            .step_logs
            .iter()
            .fold(Self::default(), |mut summary, log| {
                summary.total_steps += 1;
                match log.status {
                    StepStatus::Success => summary.success += 1,
                    StepStatus::Failed => summary.failed += 1,
                    StepStatus::Skipped => summary.skipped += 1,
                    StepStatus::Running => summary.running += 1,
                }
                summary
            })
    }
}

/// Logger bound to one run's context id.
pub struct Logger {
    pub context_id: String,
}

impl Logger {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
        }
    }

    pub fn for_context(context: &RuleContext) -> Self {
        Self::new(context.context_id.clone())
    }

    /// Initialize tracing subscriber
    ///
    /// Does nothing if a global subscriber is already installed.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .try_init();
    }

    /// Same as [`Logger::init_tracing`] with one JSON object per event.
    pub fn init_json_tracing() {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter())
            .try_init();
    }

    /// Logs and returns the step counts, trace path and error of a run.
    pub fn log_run_summary(&self, context: &RuleContext) -> RunSummary {
        let summary = RunSummary::from_context(context);

        info!(
            context_id = %self.context_id,
            trace_path = %context.trace_path,
            total_steps = summary.total_steps,
            success = summary.success,
            failed = summary.failed,
            skipped = summary.skipped,
            properties = context.properties.len(),
            reached_output = context.reached_output(),
            "Flow run summary"
        );

        if let Some(failure) = context.error() {
            error!(context_id = %self.context_id, node_id = %failure.node_id(), "Flow error: {}", failure);
        }

        summary
    }

    /// Log step execution details
    pub fn log_step_details(&self, context: &RuleContext) {
        for step_log in &context.step_logs {
            let duration = step_log
                .end_time
                .map(|end| end.duration_since(step_log.start_time))
                .unwrap_or_default();

            match step_log.status {
                StepStatus::Success => {
                    info!(
                        context_id = %self.context_id,
                        node_id = %step_log.node_id,
                        trace_path = %step_log.trace_path,
                        duration_ms = duration.as_millis(),
                        "Node completed successfully"
                    );
                }
                StepStatus::Failed => {
                    error!(
                        context_id = %self.context_id,
                        node_id = %step_log.node_id,
                        trace_path = %step_log.trace_path,
                        duration_ms = duration.as_millis(),
                        error = %step_log.error_message.as_deref().unwrap_or("Unknown error"),
                        "Node failed"
                    );
                }
                StepStatus::Skipped => {
                    warn!(
                        context_id = %self.context_id,
                        node_id = %step_log.node_id,
                        trace_path = %step_log.trace_path,
                        reason = %step_log.error_message.as_deref().unwrap_or("unknown"),
                        "Node skipped"
                    );
                }
                StepStatus::Running => {
                    warn!(
                        context_id = %self.context_id,
                        node_id = %step_log.node_id,
                        "Node still running"
                    );
                }
            }
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
