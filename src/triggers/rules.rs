//! Trigger detection rules over pipeline telemetry.
//!
//! Three independent families of pure functions: event-driven rules over raw
//! runs and traces, trend-based rules against a historical baseline, and
//! commit-based rules over changed file paths. Each returns the triggers it
//! fired; the analyzer composes them.

use std::collections::BTreeMap;

use glob::{MatchOptions, Pattern};
use serde_json::json;
use tracing::warn;

use crate::telemetry::schemas::{
    AggregatedMetrics, GateResult, OverallStatus, Phase, RunReport, Severity, TraceEvent,
    TriggerKind, TriggerResult,
};
use crate::triggers::config::{CommitBasedConfig, EventDrivenConfig, TrendBasedConfig};

fn evidence(pairs: Vec<(&str, serde_json::Value)>) -> BTreeMap<String, serde_json::Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn run_total_tokens(run: &RunReport) -> Option<f64> {
    run.total_tokens.filter(|v| v.is_finite())
}

/// Population standard deviation around a precomputed mean.
fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

// =============================================================================
// Event-driven rules
// =============================================================================

/// Check the four event-driven rules over collected runs and trace events.
pub fn check_event_driven_triggers(
    runs: &[RunReport],
    traces: &[TraceEvent],
    config: &EventDrivenConfig,
) -> Vec<TriggerResult> {
    let mut results = Vec::new();

    // Blocked guard violations across all runs.
    let total_blocked: usize = runs
        .iter()
        .map(|run| run.guard_violations.iter().filter(|v| v.blocked).count())
        .sum();
    if total_blocked >= config.guard_violation.threshold {
        results.push(TriggerResult {
            kind: TriggerKind::EventDriven,
            rule: "guard_violation".to_string(),
            severity: Severity::Critical,
            description: config.guard_violation.description.clone(),
            affected_phase: None,
            affected_agent: None,
            evidence: evidence(vec![
                ("total_guard_violations", json!(total_blocked)),
                ("threshold", json!(config.guard_violation.threshold)),
            ]),
        });
    }

    // Consecutive gate failures per phase. One trigger per phase at most;
    // scanning stops for a phase once its streak reaches the threshold.
    for phase in Phase::ALL {
        let mut streak = 0usize;
        for run in runs {
            let failed_gate = run
                .phases
                .iter()
                .any(|p| p.phase == phase && p.gate_result == GateResult::Fail);
            if failed_gate {
                streak += 1;
            } else {
                streak = 0;
            }

            if streak >= config.gate_failure_streak.threshold {
                results.push(TriggerResult {
                    kind: TriggerKind::EventDriven,
                    rule: "gate_failure_streak".to_string(),
                    severity: Severity::Warning,
                    description: config.gate_failure_streak.description.clone(),
                    affected_phase: Some(phase),
                    affected_agent: None,
                    evidence: evidence(vec![
                        ("phase", json!(phase.name())),
                        ("streak", json!(streak)),
                        ("threshold", json!(config.gate_failure_streak.threshold)),
                    ]),
                });
                break;
            }
        }
    }

    // Token anomaly: latest point versus the historical sample. Run-level
    // totals are preferred; subagent tool-call counts are the fallback series.
    let run_series: Vec<f64> = runs.iter().filter_map(run_total_tokens).collect();
    let trace_series: Vec<f64> = traces
        .iter()
        .filter_map(|e| match e {
            TraceEvent::Timing(t) if t.tool_calls_count.is_finite() => Some(t.tool_calls_count),
            _ => None,
        })
        .collect();
    let series = if run_series.is_empty() {
        &trace_series
    } else {
        &run_series
    };

    if series.len() >= 2 {
        let latest = series[series.len() - 1];
        let historical = &series[..series.len() - 1];
        let mean = historical.iter().sum::<f64>() / historical.len() as f64;
        let std_dev = standard_deviation(historical, mean);
        let z_score = if std_dev == 0.0 {
            if latest > mean {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            (latest - mean) / std_dev
        };

        if z_score >= config.token_anomaly.sigma_threshold {
            results.push(TriggerResult {
                kind: TriggerKind::EventDriven,
                rule: "token_anomaly".to_string(),
                severity: Severity::Warning,
                description: config.token_anomaly.description.clone(),
                affected_phase: None,
                affected_agent: None,
                evidence: evidence(vec![
                    ("latest", json!(latest)),
                    ("mean", json!(mean)),
                    ("std_dev", json!(std_dev)),
                    ("z_score", json!(z_score)),
                    ("sigma_threshold", json!(config.token_anomaly.sigma_threshold)),
                ]),
            });
        }
    }

    // Consecutive escalated runs.
    let mut escalation_streak = 0usize;
    for run in runs {
        if run.overall_status == OverallStatus::Escalated {
            escalation_streak += 1;
        } else {
            escalation_streak = 0;
        }

        if escalation_streak >= config.manual_intervention_streak.threshold {
            results.push(TriggerResult {
                kind: TriggerKind::EventDriven,
                rule: "manual_intervention_streak".to_string(),
                severity: Severity::Critical,
                description: config.manual_intervention_streak.description.clone(),
                affected_phase: None,
                affected_agent: None,
                evidence: evidence(vec![
                    ("escalation_streak", json!(escalation_streak)),
                    ("threshold", json!(config.manual_intervention_streak.threshold)),
                ]),
            });
            break;
        }
    }

    results
}

// =============================================================================
// Trend-based rules
// =============================================================================

/// Check the three trend rules against a historical baseline.
///
/// Runs are expected newest-first; each rule looks at its own window of the
/// most recent runs.
pub fn check_trend_based_triggers(
    runs: &[RunReport],
    baseline: &AggregatedMetrics,
    config: &TrendBasedConfig,
) -> Vec<TriggerResult> {
    let mut results = Vec::new();
    if runs.is_empty() {
        return results;
    }

    let tsr_window = &runs[..runs.len().min(config.tsr_drop.window_runs)];
    if !tsr_window.is_empty() && baseline.tsr > 0.0 {
        let done = tsr_window
            .iter()
            .filter(|r| r.overall_status == OverallStatus::Done)
            .count();
        let current_tsr = done as f64 / tsr_window.len() as f64;
        let drop_percent = (baseline.tsr - current_tsr) / baseline.tsr * 100.0;

        if drop_percent > config.tsr_drop.threshold_percent {
            results.push(TriggerResult {
                kind: TriggerKind::TrendBased,
                rule: "tsr_drop".to_string(),
                severity: Severity::Warning,
                description: config.tsr_drop.description.clone(),
                affected_phase: None,
                affected_agent: None,
                evidence: evidence(vec![
                    ("baseline_tsr", json!(baseline.tsr)),
                    ("current_tsr", json!(current_tsr)),
                    ("drop_percent", json!(drop_percent)),
                    ("threshold_percent", json!(config.tsr_drop.threshold_percent)),
                    ("window_runs", json!(tsr_window.len())),
                ]),
            });
        }
    }

    let token_window = &runs[..runs.len().min(config.token_inflation.window_runs)];
    let token_values: Vec<f64> = token_window.iter().filter_map(run_total_tokens).collect();
    if !token_values.is_empty() && baseline.total_tokens > 0.0 {
        let current_avg = token_values.iter().sum::<f64>() / token_values.len() as f64;
        let inflation_percent =
            (current_avg - baseline.total_tokens) / baseline.total_tokens * 100.0;

        if inflation_percent > config.token_inflation.threshold_percent {
            results.push(TriggerResult {
                kind: TriggerKind::TrendBased,
                rule: "token_inflation".to_string(),
                severity: Severity::Warning,
                description: config.token_inflation.description.clone(),
                affected_phase: None,
                affected_agent: None,
                evidence: evidence(vec![
                    ("baseline_avg_tokens", json!(baseline.total_tokens)),
                    ("current_avg_tokens", json!(current_avg)),
                    ("inflation_percent", json!(inflation_percent)),
                    ("threshold_percent", json!(config.token_inflation.threshold_percent)),
                    ("window_runs", json!(token_values.len())),
                ]),
            });
        }
    }

    // A run is flaky when it earned partial credit strictly between 0 and 1.
    let flake_window = &runs[..runs.len().min(config.flake_rate.window_runs)];
    if !flake_window.is_empty() {
        let flaky = flake_window
            .iter()
            .filter(|r| r.partial_credit_score > 0.0 && r.partial_credit_score < 1.0)
            .count();
        let flake_rate = flaky as f64 / flake_window.len() as f64;
        let threshold = config.flake_rate.threshold_percent / 100.0;

        if flake_rate > threshold {
            results.push(TriggerResult {
                kind: TriggerKind::TrendBased,
                rule: "flake_rate".to_string(),
                severity: Severity::Warning,
                description: config.flake_rate.description.clone(),
                affected_phase: None,
                affected_agent: None,
                evidence: evidence(vec![
                    ("flaky_runs", json!(flaky)),
                    ("window_runs", json!(flake_window.len())),
                    ("flake_rate", json!(flake_rate)),
                    ("threshold_rate", json!(threshold)),
                ]),
            });
        }
    }

    results
}

// =============================================================================
// Commit-based rules
// =============================================================================

/// Fire a single subset-evaluation trigger when any changed file matches a
/// watched path pattern.
pub fn check_commit_based_triggers(
    changed_files: &[String],
    config: &CommitBasedConfig,
) -> Vec<TriggerResult> {
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::default()
    };
    let patterns: Vec<Pattern> = config
        .watched_paths
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %p, error = %e, "ignoring malformed watched path pattern");
                None
            }
        })
        .collect();

    let matches: Vec<&String> = changed_files
        .iter()
        .filter(|file| patterns.iter().any(|p| p.matches_with(file, options)))
        .collect();

    if matches.is_empty() {
        return Vec::new();
    }

    vec![TriggerResult {
        kind: TriggerKind::CommitBased,
        rule: "watched_paths_change".to_string(),
        severity: Severity::Warning,
        description: "Changes detected in watched paths; run subset evaluation".to_string(),
        affected_phase: None,
        affected_agent: None,
        evidence: evidence(vec![
            ("matched_files", json!(matches)),
            ("watched_paths", json!(config.watched_paths)),
            ("action", json!(config.action)),
            ("subset_size", json!(config.subset_size)),
            ("block_if", json!(config.block_if)),
        ]),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_deviation_of_constant_series_is_zero() {
        assert_eq!(standard_deviation(&[5.0, 5.0, 5.0], 5.0), 0.0);
    }

    #[test]
    fn glob_star_stays_within_segment() {
        let config = CommitBasedConfig {
            watched_paths: vec!["agents/*.md".to_string()],
            action: "subset_eval".to_string(),
            subset_size: 5,
            block_if: "regression".to_string(),
        };
        let fired = check_commit_based_triggers(
            &["agents/nested/deep.md".to_string()],
            &config,
        );
        assert!(fired.is_empty());

        let fired = check_commit_based_triggers(&["agents/writer.md".to_string()], &config);
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn malformed_pattern_is_skipped_not_fatal() {
        let config = CommitBasedConfig {
            watched_paths: vec!["[invalid".to_string(), "agents/*.md".to_string()],
            action: "subset_eval".to_string(),
            subset_size: 5,
            block_if: "regression".to_string(),
        };
        let fired = check_commit_based_triggers(&["agents/writer.md".to_string()], &config);
        assert_eq!(fired.len(), 1);

        let fired = check_commit_based_triggers(&["src/main.rs".to_string()], &config);
        assert!(fired.is_empty());
    }

    #[test]
    fn glob_double_star_crosses_segments() {
        let config = CommitBasedConfig {
            watched_paths: vec!["hooks/**/*.ts".to_string()],
            action: "subset_eval".to_string(),
            subset_size: 5,
            block_if: "regression".to_string(),
        };
        let fired =
            check_commit_based_triggers(&["hooks/guards/edit.ts".to_string()], &config);
        assert_eq!(fired.len(), 1);
    }
}
