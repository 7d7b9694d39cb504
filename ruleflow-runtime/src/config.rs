use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Runtime settings of a [`GraphProcessor`](crate::GraphProcessor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Upper bound on node executors running at the same time across all
    /// runs of one processor (`None` for unlimited). Permits are held only
    /// while an executor runs.
    pub max_concurrency: Option<usize>,
    /// Whether executed nodes are appended to the context's step log.
    pub record_steps: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            record_steps: true,
        }
    }
}

impl ProcessorConfig {
    /// Create a config with maximum concurrency limit
    pub fn with_max_concurrency(concurrency: usize) -> Self {
        Self {
            max_concurrency: Some(concurrency),
            ..Default::default()
        }
    }

    /// Set maximum concurrency
    pub fn max_concurrency(mut self, concurrency: usize) -> Self {
        self.max_concurrency = Some(concurrency);
        self
    }

    pub fn record_steps(mut self, record: bool) -> Self {
        self.record_steps = record;
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).with_context(|| "Failed to parse YAML processor config")
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).with_context(|| "Failed to parse JSON processor config")
    }

    /// Loads a config file; `.json` files are read as JSON, anything else
    /// as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read processor config: {path:?}"))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ProcessorConfig::default();
        assert!(config.max_concurrency.is_none());
        assert!(config.record_steps);
    }

    #[test]
    fn test_config_chaining() {
        let config = ProcessorConfig::default()
            .max_concurrency(4)
            .record_steps(false);

        assert_eq!(config.max_concurrency, Some(4));
        assert!(!config.record_steps);
        assert_eq!(
            ProcessorConfig::with_max_concurrency(4).record_steps(false),
            config
        );
    }

    #[test]
    fn test_config_from_yaml_and_json() {
        let yaml = ProcessorConfig::from_yaml_str("max_concurrency: 8\n").unwrap();
        assert_eq!(yaml.max_concurrency, Some(8));
        assert!(yaml.record_steps);

        let json =
            ProcessorConfig::from_json_str(r#"{"record_steps": false}"#).unwrap();
        assert_eq!(json.max_concurrency, None);
        assert!(!json.record_steps);

        assert!(ProcessorConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let path = std::env::temp_dir().join(format!(
            "ruleflow-processor-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{"max_concurrency": 2}"#).unwrap();

        let config = ProcessorConfig::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.max_concurrency, Some(2));
        assert!(ProcessorConfig::from_file(&path).is_err());
    }
}
