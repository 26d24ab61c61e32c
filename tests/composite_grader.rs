use std::collections::BTreeMap;

use refinery_harness::grading::composite::{grade_composite, CompositeConfig};
use refinery_harness::telemetry::schemas::GraderResult;

fn grader(name: &str, score: f64) -> (String, GraderResult) {
    (
        name.to_string(),
        GraderResult {
            grader: name.to_string(),
            score,
            pass: score >= 0.5,
            details: BTreeMap::new(),
        },
    )
}

#[test]
fn worked_example() {
    // test_runner 1.0 at weight 0.30, everything else absent: ensemble 0.30.
    // 4 of 6 phases: progression 0.6667. Final = 0.6667*0.4 + 0.30*0.6.
    let config = CompositeConfig::default_weights();
    let results: BTreeMap<_, _> = [grader("test_runner", 1.0)].into_iter().collect();

    let result = grade_composite(&config, &results, 4, 6).unwrap();
    assert!((result.partial_credit.grader_ensemble_score - 0.30).abs() < 1e-9);
    assert!((result.partial_credit.phase_progression_score - 4.0 / 6.0).abs() < 1e-9);
    assert!((result.overall_score - 0.4467).abs() < 0.001);
    assert!(!result.pass);
}

#[test]
fn missing_graders_score_zero_without_error() {
    let config = CompositeConfig::default_weights();
    let result = grade_composite(&config, &BTreeMap::new(), 6, 6).unwrap();
    assert_eq!(result.partial_credit.grader_ensemble_score, 0.0);
    // Full progression alone caps at 0.4, below the 0.5 pass threshold.
    assert!((result.overall_score - 0.4).abs() < 1e-12);
    assert!(!result.pass);
}

#[test]
fn progression_clamps_out_of_range_counts() {
    let config = CompositeConfig::default_weights();

    let over = grade_composite(&config, &BTreeMap::new(), 7, 6).unwrap();
    assert_eq!(over.partial_credit.phase_progression_score, 1.0);

    let under = grade_composite(&config, &BTreeMap::new(), -1, 6).unwrap();
    assert_eq!(under.partial_credit.phase_progression_score, 0.0);
}

#[test]
fn zero_total_phases_does_not_panic() {
    let config = CompositeConfig::default_weights();
    let result = grade_composite(&config, &BTreeMap::new(), 0, 0).unwrap();
    assert_eq!(result.partial_credit.phase_progression_score, 0.0);
    assert_eq!(result.overall_score, 0.0);
}

#[test]
fn pass_threshold_is_inclusive() {
    // Single grader at full weight scoring 0.5, half progression:
    // final = 0.5*0.4 + 0.5*0.6, exactly 0.5 in floats.
    let config = CompositeConfig {
        weights: [("test_runner".to_string(), 1.0)].into_iter().collect(),
    };
    let results: BTreeMap<_, _> = [grader("test_runner", 0.5)].into_iter().collect();
    let result = grade_composite(&config, &results, 3, 6).unwrap();
    assert_eq!(result.overall_score, 0.5);
    assert!(result.pass);
}
