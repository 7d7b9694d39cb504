use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Node definition as handed over by the definition layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    pub component_name: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    /// Marks the flow's output node.
    #[serde(default, rename = "isOutputMarker")]
    pub output: bool,
}

/// Directed edge, optionally tagged with a choice branch label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_label: Option<String>,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, component_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component_name: component_name.into(),
            parameters: HashMap::new(),
            output: false,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn as_output(mut self) -> Self {
        self.output = true;
        self
    }
}

impl EdgeRecord {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            branch_label: None,
        }
    }

    pub fn on_branch(mut self, label: impl Into<String>) -> Self {
        self.branch_label = Some(label.into());
        self
    }

    /// Label if present and non-empty.
    pub fn label(&self) -> Option<&str> {
        self.branch_label.as_deref().filter(|label| !label.is_empty())
    }
}
