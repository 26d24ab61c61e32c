//! Trigger rule configuration and its YAML loader.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read triggers config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid triggers config {path}: {detail}")]
    Invalid { path: String, detail: String },
}

/// Threshold + human description for a counting rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountRuleConfig {
    pub threshold: usize,
    pub description: String,
}

/// Sigma threshold + description for the token anomaly rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRuleConfig {
    pub sigma_threshold: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDrivenConfig {
    pub guard_violation: CountRuleConfig,
    pub gate_failure_streak: CountRuleConfig,
    pub token_anomaly: AnomalyRuleConfig,
    pub manual_intervention_streak: CountRuleConfig,
}

/// Percent threshold over a fixed window of recent runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRuleConfig {
    pub threshold_percent: f64,
    pub window_runs: usize,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendBasedConfig {
    pub tsr_drop: WindowRuleConfig,
    pub token_inflation: WindowRuleConfig,
    pub flake_rate: WindowRuleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBasedConfig {
    /// Glob patterns; `*` matches within a path segment, `**` across segments.
    pub watched_paths: Vec<String>,
    pub action: String,
    pub subset_size: usize,
    pub block_if: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRulesConfig {
    pub event_driven: EventDrivenConfig,
    pub trend_based: TrendBasedConfig,
    pub commit_based: CommitBasedConfig,
}

/// Top-level triggers config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggersConfig {
    pub auto_refinement_triggers: TriggerRulesConfig,
}

/// Load a triggers config from a YAML (or JSON; YAML is a superset) file.
pub fn load_triggers_config(path: impl AsRef<Path>) -> Result<TriggersConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&raw).map_err(|e| ConfigError::Invalid {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}
