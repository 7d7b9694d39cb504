use crate::{Condition, Expression};
use anyhow::{Context, Result};
use ruleflow_context::{NodeFailure, RuleContext};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One `when` clause of a choice node.
#[derive(Clone)]
pub struct ChoiceBranch {
    /// May be empty: a matching branch without successors ends the path.
    pub label: String,
    pub condition: Arc<dyn Condition>,
}

/// First-match evaluator over an ordered list of conditions.
#[derive(Clone, Default)]
pub struct ChoiceExecutor {
    branches: Vec<ChoiceBranch>,
    otherwise: String,
}

#[derive(Debug, Deserialize)]
struct ChoiceParameters {
    #[serde(default)]
    when: Vec<WhenParameters>,
    #[serde(default)]
    otherwise: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhenParameters {
    #[serde(default)]
    id: String,
    condition: String,
}

impl ChoiceExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when<C>(mut self, label: impl Into<String>, condition: C) -> Self
    where
        C: Condition + 'static,
    {
        self.branches.push(ChoiceBranch {
            label: label.into(),
            condition: Arc::new(condition),
        });
        self
    }

    pub fn otherwise(mut self, label: impl Into<String>) -> Self {
        self.otherwise = label.into();
        self
    }

    /// Builds a choice from node parameters of the form
    /// `{"when": [{"id": "..", "condition": ".."}], "otherwise": ".."}`.
    pub fn from_parameters(parameters: &HashMap<String, Value>) -> Result<Self> {
        let raw = Value::Object(
            parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let parsed: ChoiceParameters =
            serde_json::from_value(raw).context("invalid choice parameters")?;

        let mut choice = Self::new().otherwise(parsed.otherwise.unwrap_or_default());
        for when in parsed.when {
            let expression = Expression::parse(&when.condition)
                .with_context(|| format!("condition of branch '{}'", when.id))?;
            choice = choice.when(when.id, expression);
        }
        Ok(choice)
    }

    pub fn branches(&self) -> &[ChoiceBranch] {
        &self.branches
    }

    pub fn otherwise_label(&self) -> &str {
        &self.otherwise
    }

    /// Selects a branch and writes it as the context's branch marker.
    ///
    /// The marker is cleared first. If a condition fails the failure is
    /// recorded on the context, no marker is written and evaluation stops.
    pub fn evaluate(&self, node_id: &str, ctx: &mut RuleContext) -> Result<String, NodeFailure> {
        ctx.clear_branch();

        for branch in &self.branches {
            match branch.condition.test(ctx) {
                Ok(true) => {
                    tracing::debug!(node = %node_id, branch = %branch.label, "choice matched");
                    ctx.set_branch(branch.label.clone());
                    return Ok(branch.label.clone());
                }
                Ok(false) => {}
                Err(err) => {
                    let failure = NodeFailure::branch_evaluation(
                        node_id,
                        format!("{err:#}"),
                        ctx.trace_path.clone(),
                    );
                    ctx.record_error(failure.clone());
                    return Err(failure);
                }
            }
        }

        tracing::debug!(node = %node_id, otherwise = %self.otherwise, "no choice matched");
        ctx.set_branch(self.otherwise.clone());
        Ok(self.otherwise.clone())
    }
}

impl fmt::Debug for ChoiceExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.branches.iter().map(|b| b.label.as_str()).collect();
        f.debug_struct("ChoiceExecutor")
            .field("branches", &labels)
            .field("otherwise", &self.otherwise)
            .finish()
    }
}
