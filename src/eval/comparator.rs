//! Per-task pairing of control and variant results, and the comparison
//! report built on top of an experiment record.

use std::collections::HashSet;

use serde::Serialize;

use crate::telemetry::schemas::{
    AggregatedMetrics, ExperimentResult, TaskComparison, TaskOutcome, TaskTrialResult,
};

/// A task regresses when its best score drops by more than this tolerance.
pub const REGRESSION_TOLERANCE: f64 = 0.05;

fn classify_outcome(score: f64) -> TaskOutcome {
    if score >= 0.5 {
        TaskOutcome::Pass
    } else if score < 0.25 {
        TaskOutcome::Fail
    } else {
        TaskOutcome::Partial
    }
}

fn best_score(results: &[TaskTrialResult], task_id: &str) -> f64 {
    results
        .iter()
        .filter(|r| r.task_id == task_id)
        .map(|r| r.composite_result.overall_score)
        .fold(f64::NEG_INFINITY, f64::max)
        // A side with no trials for this task scores 0.
        .max(0.0)
}

/// Round to 10 decimals; guards float noise exactly at the -0.05 boundary,
/// where a delta of exactly -0.05 is not a regression.
fn round10(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}

/// Pair control and variant best-of-trials scores per task.
///
/// Every task id appearing on either side gets a comparison, in first-seen
/// order (control list first).
pub fn build_task_comparisons(
    control_results: &[TaskTrialResult],
    variant_results: &[TaskTrialResult],
) -> Vec<TaskComparison> {
    let mut task_ids: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for r in control_results.iter().chain(variant_results) {
        if seen.insert(r.task_id.as_str()) {
            task_ids.push(r.task_id.as_str());
        }
    }

    task_ids
        .into_iter()
        .map(|task_id| {
            let control_score = best_score(control_results, task_id);
            let variant_score = best_score(variant_results, task_id);
            let delta = variant_score - control_score;
            TaskComparison {
                task_id: task_id.to_string(),
                control_outcome: classify_outcome(control_score),
                variant_outcome: classify_outcome(variant_score),
                control_score,
                variant_score,
                delta,
                regression: round10(delta) < -REGRESSION_TOLERANCE,
            }
        })
        .collect()
}

// =============================================================================
// Comparison report
// =============================================================================

/// Derived view of an experiment for reporting: metric deltas and the task
/// comparisons bucketed by direction.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub experiment_id: String,
    pub control_metrics: AggregatedMetrics,
    pub variant_metrics: AggregatedMetrics,
    /// variant − control per KPI, in KPI declaration order.
    pub deltas: Vec<(String, f64)>,
    pub regressions: Vec<TaskComparison>,
    pub improvements: Vec<TaskComparison>,
    pub unchanged: Vec<TaskComparison>,
    pub net_assessment: String,
}

fn metric_values(m: &AggregatedMetrics) -> Vec<(&'static str, f64)> {
    vec![
        ("tsr", m.tsr),
        ("pass_at_1", m.pass_at_1),
        ("pass_3", m.pass_3),
        ("code_quality_score", m.code_quality_score),
        ("total_tokens", m.total_tokens),
        ("median_cycle_time", m.median_cycle_time),
        ("gate_failure_rate", m.gate_failure_rate),
        ("guard_violations", m.guard_violations as f64),
    ]
}

pub fn build_comparison_report(result: &ExperimentResult) -> ComparisonReport {
    let control = metric_values(&result.control_results);
    let variant = metric_values(&result.variant_results);
    let deltas = control
        .iter()
        .zip(&variant)
        .map(|((key, c), (_, v))| (key.to_string(), v - c))
        .collect();

    let regressions = result
        .per_task_comparison
        .iter()
        .filter(|t| t.regression)
        .cloned()
        .collect();
    let improvements = result
        .per_task_comparison
        .iter()
        .filter(|t| !t.regression && t.delta > 0.0)
        .cloned()
        .collect();
    let unchanged = result
        .per_task_comparison
        .iter()
        .filter(|t| !t.regression && t.delta <= 0.0)
        .cloned()
        .collect();

    let net_assessment = format!(
        "{}: {}",
        result.decision.as_str().to_uppercase(),
        result.decision_rationale
    );

    ComparisonReport {
        experiment_id: result.experiment_id.clone(),
        control_metrics: result.control_results.clone(),
        variant_metrics: result.variant_results.clone(),
        deltas,
        regressions,
        improvements,
        unchanged,
        net_assessment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_boundaries() {
        assert_eq!(classify_outcome(0.5), TaskOutcome::Pass);
        assert_eq!(classify_outcome(0.25), TaskOutcome::Partial);
        assert_eq!(classify_outcome(0.249), TaskOutcome::Fail);
    }

    #[test]
    fn round10_pins_the_boundary() {
        // 0.75 - 0.80 in floats lands a hair below -0.05; rounding restores it.
        let delta = 0.75_f64 - 0.80_f64;
        assert!(round10(delta) >= -REGRESSION_TOLERANCE);
    }
}
