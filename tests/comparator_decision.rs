use std::collections::BTreeMap;

use refinery_harness::eval::comparator::build_task_comparisons;
use refinery_harness::eval::decision::make_decision;
use refinery_harness::telemetry::schemas::{
    AggregatedMetrics, CompositeResult, Decision, PartialCreditBreakdown, TaskOutcome,
    TaskTrialResult,
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

fn metrics(tsr: f64, pass_at_1: f64, quality: f64) -> AggregatedMetrics {
    AggregatedMetrics {
        tsr,
        pass_at_1,
        pass_3: tsr,
        code_quality_score: quality,
        total_tokens: 0.0,
        median_cycle_time: 60_000.0,
        gate_failure_rate: 0.0,
        guard_violations: 0,
    }
}

#[test]
fn drop_of_exactly_tolerance_is_not_a_regression() {
    let control = vec![trial("t1", 0, 0.80)];
    let variant = vec![trial("t1", 0, 0.75)];
    let comparisons = build_task_comparisons(&control, &variant);
    assert_eq!(comparisons.len(), 1);
    assert!(!comparisons[0].regression);
}

#[test]
fn drop_just_past_tolerance_is_a_regression() {
    let control = vec![trial("t1", 0, 0.80)];
    let variant = vec![trial("t1", 0, 0.749999)];
    let comparisons = build_task_comparisons(&control, &variant);
    assert!(comparisons[0].regression);
}

#[test]
fn best_of_trials_is_compared_per_side() {
    let control = vec![trial("t1", 0, 0.4), trial("t1", 1, 0.9)];
    let variant = vec![trial("t1", 0, 0.85)];
    let comparisons = build_task_comparisons(&control, &variant);
    assert_eq!(comparisons[0].control_score, 0.9);
    assert_eq!(comparisons[0].variant_score, 0.85);
    assert!(!comparisons[0].regression);
}

#[test]
fn task_missing_on_one_side_scores_zero_there() {
    let control = vec![trial("t1", 0, 0.8)];
    let variant = vec![trial("t2", 0, 0.7)];
    let comparisons = build_task_comparisons(&control, &variant);
    assert_eq!(comparisons.len(), 2);

    let t1 = comparisons.iter().find(|c| c.task_id == "t1").unwrap();
    assert_eq!(t1.variant_score, 0.0);
    assert_eq!(t1.variant_outcome, TaskOutcome::Fail);
    assert!(t1.regression);

    let t2 = comparisons.iter().find(|c| c.task_id == "t2").unwrap();
    assert_eq!(t2.control_score, 0.0);
    assert_eq!(t2.control_outcome, TaskOutcome::Fail);
}

#[test]
fn any_key_metric_strictly_worse_rejects() {
    let control = metrics(0.8, 0.6, 0.7);
    let worse_quality = metrics(0.8, 0.6, 0.699);
    let outcome = make_decision(&control, &worse_quality, &[]);
    assert_eq!(outcome.decision, Decision::Reject);
    assert!(outcome.rationale.contains("code_quality_score degraded"));
}

#[test]
fn regression_rate_at_exactly_twenty_percent_accepts_with_caveat() {
    // 1 regressed task out of 5 is exactly the 20% limit, which is tolerated.
    let control: Vec<_> = (0..5).map(|i| trial(&format!("t{i}"), 0, 0.9)).collect();
    let mut variant: Vec<_> = (0..5).map(|i| trial(&format!("t{i}"), 0, 0.9)).collect();
    variant[4] = trial("t4", 0, 0.3);

    let comparisons = build_task_comparisons(&control, &variant);
    assert_eq!(comparisons.iter().filter(|c| c.regression).count(), 1);

    let side = metrics(0.8, 0.8, 0.8);
    let outcome = make_decision(&side, &side, &comparisons);
    assert_eq!(outcome.decision, Decision::AcceptWithCaveat);
    assert!(outcome.rationale.contains("within 20% threshold"));
}

#[test]
fn regression_rate_above_twenty_percent_rejects() {
    // 1 regressed task out of 3 exceeds the limit even with flat KPIs.
    let control: Vec<_> = (0..3).map(|i| trial(&format!("t{i}"), 0, 0.9)).collect();
    let mut variant: Vec<_> = (0..3).map(|i| trial(&format!("t{i}"), 0, 0.9)).collect();
    variant[2] = trial("t2", 0, 0.3);

    let comparisons = build_task_comparisons(&control, &variant);
    let side = metrics(0.8, 0.8, 0.8);
    let outcome = make_decision(&side, &side, &comparisons);
    assert_eq!(outcome.decision, Decision::Reject);
    assert!(outcome.rationale.contains("exceeds 20% threshold"));
}

#[test]
fn clean_sweep_accepts() {
    let control = vec![trial("t1", 0, 0.7)];
    let variant = vec![trial("t1", 0, 0.9)];
    let comparisons = build_task_comparisons(&control, &variant);

    let outcome = make_decision(
        &metrics(0.7, 0.7, 0.7),
        &metrics(0.9, 0.9, 0.9),
        &comparisons,
    );
    assert_eq!(outcome.decision, Decision::Accept);
    assert!(outcome.rationale.contains("zero task regressions"));
}
