use std::collections::BTreeMap;

use refinery_harness::eval::aggregate::aggregate_trial_results;
use refinery_harness::telemetry::schemas::{
    AggregatedMetrics, CompositeResult, GraderResult, PartialCreditBreakdown, TaskTrialResult,
};

fn trial(task_id: &str, trial: usize, score: f64) -> TaskTrialResult {
    TaskTrialResult {
        task_id: task_id.to_string(),
        trial,
        composite_result: CompositeResult {
            overall_score: score,
            pass: score >= 0.5,
            individual_scores: BTreeMap::new(),
            partial_credit: PartialCreditBreakdown {
                phases_completed: 6,
                phases_total: 6,
                phase_progression_score: 1.0,
                grader_ensemble_score: score,
                final_score: score,
            },
        },
        duration_ms: 60_000,
        agent_exit_code: 0,
    }
}

fn with_guard_compliance(mut result: TaskTrialResult, score: f64) -> TaskTrialResult {
    result.composite_result.individual_scores.insert(
        "guard_compliance".to_string(),
        GraderResult {
            grader: "guard_compliance".to_string(),
            score,
            pass: score > 0.0,
            details: BTreeMap::new(),
        },
    );
    result
}

#[test]
fn empty_input_is_the_zero_vector() {
    assert_eq!(aggregate_trial_results(&[], 5), AggregatedMetrics::zero());
    assert_eq!(
        aggregate_trial_results(&[trial("t1", 0, 0.8)], 0),
        AggregatedMetrics::zero()
    );
}

#[test]
fn first_trial_failure_with_later_passes() {
    // Trial 0 fails, trials 1 and 2 pass: the task counts for tsr and pass_3
    // but not pass@1.
    let results = vec![
        trial("t1", 0, 0.3),
        trial("t1", 1, 0.8),
        trial("t1", 2, 0.9),
    ];
    let metrics = aggregate_trial_results(&results, 1);
    assert_eq!(metrics.tsr, 1.0);
    assert_eq!(metrics.pass_at_1, 0.0);
    assert_eq!(metrics.pass_3, 1.0);
}

#[test]
fn rates_use_the_full_task_count_denominator() {
    // Two tasks in the dataset but only one produced trials.
    let results = vec![trial("t1", 0, 0.9)];
    let metrics = aggregate_trial_results(&results, 2);
    assert_eq!(metrics.tsr, 0.5);
    assert_eq!(metrics.pass_at_1, 0.5);
    assert_eq!(metrics.pass_3, 0.5);
}

#[test]
fn code_quality_is_a_flat_mean_over_trials() {
    let results = vec![
        trial("t1", 0, 0.4),
        trial("t1", 1, 0.8),
        trial("t2", 0, 0.6),
    ];
    let metrics = aggregate_trial_results(&results, 2);
    assert!((metrics.code_quality_score - 0.6).abs() < 1e-12);
}

#[test]
fn gate_failure_rate_complements_progression() {
    let mut partial = trial("t1", 0, 0.5);
    partial.composite_result.partial_credit.phase_progression_score = 0.5;
    let full = trial("t2", 0, 0.9);

    let metrics = aggregate_trial_results(&[partial, full], 2);
    // Mean progression 0.75, so 25% of phase work was lost to gate failures.
    assert!((metrics.gate_failure_rate - 0.25).abs() < 1e-12);
}

#[test]
fn guard_violations_count_zero_scored_compliance_trials() {
    let results = vec![
        with_guard_compliance(trial("t1", 0, 0.8), 0.0),
        with_guard_compliance(trial("t1", 1, 0.8), 1.0),
        // No guard_compliance grader at all does not count as a violation.
        trial("t2", 0, 0.8),
    ];
    let metrics = aggregate_trial_results(&results, 2);
    assert_eq!(metrics.guard_violations, 1);
}

#[test]
fn median_cycle_time_over_all_trials() {
    let mut fast = trial("t1", 0, 0.8);
    fast.duration_ms = 10_000;
    let mut slow = trial("t2", 0, 0.8);
    slow.duration_ms = 50_000;

    let metrics = aggregate_trial_results(&[fast, slow], 2);
    assert_eq!(metrics.median_cycle_time, 30_000.0);
}
