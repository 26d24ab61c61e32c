//! Reduction of per-task, per-trial results into branch-level KPIs.

use std::collections::HashMap;

use crate::telemetry::schemas::{AggregatedMetrics, TaskTrialResult};

/// Pass threshold for a task's best-of-N score.
const TASK_SUCCESS_THRESHOLD: f64 = 0.5;

/// Standard median; mean of the two middle values for even counts.
fn median(values: &mut Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Aggregate a flat list of trial results into branch-level KPIs.
///
/// Empty inputs produce the all-zero vector; no field is ever NaN. A crashed
/// trial is not special-cased here: it arrives with whatever composite score
/// the grading layer assigned and flows through the math like any other.
pub fn aggregate_trial_results(
    results: &[TaskTrialResult],
    task_count: usize,
) -> AggregatedMetrics {
    if results.is_empty() || task_count == 0 {
        return AggregatedMetrics::zero();
    }

    let mut by_task: HashMap<&str, Vec<&TaskTrialResult>> = HashMap::new();
    for r in results {
        by_task.entry(r.task_id.as_str()).or_default().push(r);
    }

    let mut tsr_count = 0usize;
    let mut pass_at_1_count = 0usize;
    let mut pass_3_count = 0usize;

    for task_results in by_task.values() {
        let best = task_results
            .iter()
            .map(|r| r.composite_result.overall_score)
            .fold(f64::NEG_INFINITY, f64::max);
        if best >= TASK_SUCCESS_THRESHOLD {
            tsr_count += 1;
        }

        // pass@1 looks only at trial index 0; a task can pass later trials
        // without passing here.
        if task_results
            .iter()
            .any(|r| r.trial == 0 && r.composite_result.pass)
        {
            pass_at_1_count += 1;
        }

        if task_results.iter().any(|r| r.composite_result.pass) {
            pass_3_count += 1;
        }
    }

    let tsr = tsr_count as f64 / task_count as f64;
    let pass_at_1 = pass_at_1_count as f64 / task_count as f64;
    let pass_3 = pass_3_count as f64 / task_count as f64;

    // Flat mean over all trials, not a per-task mean of means.
    let code_quality_score = results
        .iter()
        .map(|r| r.composite_result.overall_score)
        .sum::<f64>()
        / results.len() as f64;

    let mut durations: Vec<f64> = results.iter().map(|r| r.duration_ms as f64).collect();
    let median_cycle_time = median(&mut durations);

    let avg_phase_progression = results
        .iter()
        .map(|r| r.composite_result.partial_credit.phase_progression_score)
        .sum::<f64>()
        / results.len() as f64;
    let gate_failure_rate = 1.0 - avg_phase_progression;

    let guard_violations = results
        .iter()
        .filter(|r| {
            r.composite_result
                .individual_scores
                .get("guard_compliance")
                .is_some_and(|g| g.score == 0.0)
        })
        .count() as u64;

    AggregatedMetrics {
        tsr,
        pass_at_1,
        pass_3,
        code_quality_score,
        total_tokens: 0.0,
        median_cycle_time,
        gate_failure_rate,
        guard_violations,
    }
}
