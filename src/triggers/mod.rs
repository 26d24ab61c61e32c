//! Trigger detection: rule families, configuration and the analyzer.

pub mod analyzer;
pub mod config;
pub mod rules;

pub use analyzer::{analyze, analyze_artifacts};
pub use config::{
    load_triggers_config, CommitBasedConfig, ConfigError, EventDrivenConfig, TrendBasedConfig,
    TriggersConfig,
};
pub use rules::{
    check_commit_based_triggers, check_event_driven_triggers, check_trend_based_triggers,
};
