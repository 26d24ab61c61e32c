//! Descriptive KPI computation over collected run reports, per-role metric
//! breakdowns, and threshold checking against target values.
//!
//! These are observational views of historical runs. The A/B evaluation path
//! in [`crate::eval`] has its own aggregation because its inputs are trial
//! results rather than pipeline run reports.

use serde::{Deserialize, Serialize};

use crate::telemetry::schemas::{AggregatedMetrics, Phase, RunReport};

// =============================================================================
// Pipeline KPIs
// =============================================================================

/// Descriptive KPIs over a set of run reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineKpis {
    pub tsr: f64,
    pub pass_at_1: f64,
    pub code_quality_score: f64,
    pub gate_failure_rate: f64,
    /// Median per-run cycle time in seconds.
    pub median_cycle_time: f64,
    pub total_retries_avg: f64,
    pub fix_routing_cycles_avg: f64,
    pub guard_violations_total: u64,
    pub guard_violations_per_run: f64,
}

impl PipelineKpis {
    fn zero() -> Self {
        Self {
            tsr: 0.0,
            pass_at_1: 0.0,
            code_quality_score: 0.0,
            gate_failure_rate: 0.0,
            median_cycle_time: 0.0,
            total_retries_avg: 0.0,
            fix_routing_cycles_avg: 0.0,
            guard_violations_total: 0,
            guard_violations_per_run: 0.0,
        }
    }
}

/// Parse a duration string `"<int>[s|m|h]"` into seconds. Anything that does
/// not match yields 0.
fn parse_duration(duration: Option<&str>) -> u64 {
    let Some(duration) = duration else { return 0 };
    let (digits, unit) = match duration.bytes().last() {
        Some(b's') => (&duration[..duration.len() - 1], 1),
        Some(b'm') => (&duration[..duration.len() - 1], 60),
        Some(b'h') => (&duration[..duration.len() - 1], 3600),
        _ => (duration, 1),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    digits.parse::<u64>().map(|v| v * unit).unwrap_or(0)
}

fn median(mut values: Vec<f64>) -> f64 {
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

/// Compute descriptive KPIs over run reports. Empty input yields all zeros.
///
/// Here `pass_at_1` means a DONE run with zero retries across all phases,
/// and `tsr` is the DONE fraction.
pub fn compute_pipeline_kpis(reports: &[RunReport]) -> PipelineKpis {
    if reports.is_empty() {
        return PipelineKpis::zero();
    }

    let mut done = 0usize;
    let mut pass_at_1 = 0usize;
    let mut total_score = 0.0;
    let mut total_gate_failures = 0usize;
    let mut total_phases = 0usize;
    let mut cycle_times = Vec::with_capacity(reports.len());
    let mut total_retries = 0u64;
    let mut total_fix_cycles = 0u64;
    let mut total_guard_violations = 0u64;

    for report in reports {
        let retries: u64 = report.phases.iter().map(|p| p.retries as u64).sum();
        let cycle_time: u64 = report
            .phases
            .iter()
            .map(|p| parse_duration(p.duration_estimate.as_deref()))
            .sum();

        total_phases += report.phases.len();
        total_gate_failures += report
            .phases
            .iter()
            .filter(|p| p.gate_result == crate::telemetry::schemas::GateResult::Fail)
            .count();

        if report.overall_status == crate::telemetry::schemas::OverallStatus::Done {
            done += 1;
            if retries == 0 {
                pass_at_1 += 1;
            }
        }

        total_score += report.partial_credit_score;
        cycle_times.push(cycle_time as f64);
        total_retries += retries;
        total_fix_cycles += (report.fix_routing.code_review_cycles
            + report.fix_routing.arch_review_cycles) as u64;
        total_guard_violations += report.guard_violations.len() as u64;
    }

    let n = reports.len() as f64;
    PipelineKpis {
        tsr: done as f64 / n,
        pass_at_1: pass_at_1 as f64 / n,
        code_quality_score: total_score / n,
        gate_failure_rate: if total_phases > 0 {
            total_gate_failures as f64 / total_phases as f64
        } else {
            0.0
        },
        median_cycle_time: median(cycle_times),
        total_retries_avg: total_retries as f64 / n,
        fix_routing_cycles_avg: total_fix_cycles as f64 / n,
        guard_violations_total: total_guard_violations,
        guard_violations_per_run: total_guard_violations as f64 / n,
    }
}

// =============================================================================
// Per-role metrics
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestWriterMetrics {
    pub failing_test_rate: f64,
    pub red_invalid_rate: f64,
    pub retries_to_valid_red: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementerMetrics {
    pub tests_pass_rate: f64,
    pub retry_count_avg: f64,
    pub escalation_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefactorerMetrics {
    pub tests_remain_green_rate: f64,
    pub regression_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeReviewerMetrics {
    pub fix_cycles_avg: f64,
    pub escalation_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectReviewerMetrics {
    pub fix_cycles_avg: f64,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumenterMetrics {
    pub completion_rate: f64,
}

/// Per-agent-role metric breakdown, keyed by the six pipeline roles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleMetrics {
    #[serde(rename = "tdd-test-writer")]
    pub test_writer: TestWriterMetrics,
    #[serde(rename = "tdd-implementer")]
    pub implementer: ImplementerMetrics,
    #[serde(rename = "tdd-refactorer")]
    pub refactorer: RefactorerMetrics,
    #[serde(rename = "tdd-code-reviewer")]
    pub code_reviewer: CodeReviewerMetrics,
    #[serde(rename = "tdd-architect-reviewer")]
    pub architect_reviewer: ArchitectReviewerMetrics,
    #[serde(rename = "tdd-documenter")]
    pub documenter: DocumenterMetrics,
}

#[derive(Default)]
struct RoleCounts {
    red_phases: u64,
    red_invalid: u64,
    red_retries: u64,
    red_passes: u64,
    green_phases: u64,
    green_retries: u64,
    green_passes: u64,
    green_escalations: u64,
    refactor_phases: u64,
    refactor_regressions: u64,
    refactor_passes: u64,
    code_review_cycles: u64,
    code_review_escalations: u64,
    arch_review_cycles: u64,
    arch_review_passes: u64,
    docs_passes: u64,
}

fn safe_div(num: u64, den: u64) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Attribute run outcomes to the agent roles responsible for each phase.
pub fn compute_role_metrics(reports: &[RunReport]) -> RoleMetrics {
    let total_runs = reports.len() as u64;
    if total_runs == 0 {
        return RoleMetrics::default();
    }

    let mut c = RoleCounts::default();
    for report in reports {
        let mut red_pass = false;
        let mut green_pass = false;
        let mut refactor_pass = false;
        let mut arch_pass = false;
        let mut docs_pass = false;

        for phase in &report.phases {
            let is_pass = phase.gate_result == crate::telemetry::schemas::GateResult::Pass;
            match phase.phase {
                Phase::Red => {
                    c.red_phases += 1;
                    c.red_retries += phase.retries as u64;
                    red_pass |= is_pass;
                    // An invalid RED is a test that fails for the wrong
                    // reason, not because the feature is missing.
                    if phase
                        .gate_failure_reason
                        .as_deref()
                        .is_some_and(|r| r.contains("syntax") || r.contains("import"))
                    {
                        c.red_invalid += 1;
                    }
                }
                Phase::Green => {
                    c.green_phases += 1;
                    c.green_retries += phase.retries as u64;
                    green_pass |= is_pass;
                }
                Phase::Refactor => {
                    c.refactor_phases += 1;
                    if is_pass {
                        refactor_pass = true;
                    } else {
                        c.refactor_regressions += 1;
                    }
                }
                Phase::ArchReview => arch_pass |= is_pass,
                Phase::Docs => docs_pass |= is_pass,
                Phase::CodeReview => {}
            }
        }

        c.code_review_cycles += report.fix_routing.code_review_cycles as u64;
        c.arch_review_cycles += report.fix_routing.arch_review_cycles as u64;
        for esc in &report.fix_routing.escalations {
            if esc.phase == "GREEN" {
                c.green_escalations += 1;
            }
            if esc.phase == "CODE_REVIEW" {
                c.code_review_escalations += 1;
            }
        }

        c.red_passes += red_pass as u64;
        c.green_passes += green_pass as u64;
        c.refactor_passes += refactor_pass as u64;
        c.arch_review_passes += arch_pass as u64;
        c.docs_passes += docs_pass as u64;
    }

    RoleMetrics {
        test_writer: TestWriterMetrics {
            failing_test_rate: safe_div(c.red_passes, total_runs),
            red_invalid_rate: safe_div(c.red_invalid, c.red_phases),
            retries_to_valid_red: safe_div(c.red_retries, c.red_phases),
        },
        implementer: ImplementerMetrics {
            tests_pass_rate: safe_div(c.green_passes, total_runs),
            retry_count_avg: safe_div(c.green_retries, c.green_phases),
            escalation_rate: safe_div(c.green_escalations, total_runs),
        },
        refactorer: RefactorerMetrics {
            tests_remain_green_rate: safe_div(c.refactor_passes, total_runs),
            regression_rate: safe_div(c.refactor_regressions, c.refactor_phases),
        },
        code_reviewer: CodeReviewerMetrics {
            fix_cycles_avg: safe_div(c.code_review_cycles, total_runs),
            escalation_rate: safe_div(c.code_review_escalations, total_runs),
        },
        architect_reviewer: ArchitectReviewerMetrics {
            fix_cycles_avg: safe_div(c.arch_review_cycles, total_runs),
            pass_rate: safe_div(c.arch_review_passes, total_runs),
        },
        documenter: DocumenterMetrics {
            completion_rate: safe_div(c.docs_passes, total_runs),
        },
    }
}

// =============================================================================
// Thresholds
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineKpiTargets {
    pub tsr_target: f64,
    pub pass_at_1_target: f64,
    pub pass_3_target: f64,
    pub code_quality_score_target: f64,
    pub gate_failure_rate_max_per_phase: f64,
    pub guard_violations_max: u64,
}

/// Target values the aggregated KPI vector is held against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    pub pipeline_kpis: PipelineKpiTargets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MaxExceeded,
    MinNotMet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdViolation {
    pub metric: String,
    pub actual: f64,
    pub expected: f64,
    #[serde(rename = "violation_type")]
    pub kind: ViolationKind,
}

/// Hold an aggregated KPI vector against target thresholds. Meeting a target
/// exactly is not a violation.
pub fn compare_to_thresholds(
    metrics: &AggregatedMetrics,
    thresholds: &ThresholdsConfig,
) -> Vec<ThresholdViolation> {
    let kpis = &thresholds.pipeline_kpis;
    let mut violations = Vec::new();

    let mut min_not_met = |metric: &str, actual: f64, target: f64| {
        if actual < target {
            violations.push(ThresholdViolation {
                metric: metric.to_string(),
                actual,
                expected: target,
                kind: ViolationKind::MinNotMet,
            });
        }
    };
    min_not_met("tsr", metrics.tsr, kpis.tsr_target);
    min_not_met("pass_at_1", metrics.pass_at_1, kpis.pass_at_1_target);
    min_not_met("pass_3", metrics.pass_3, kpis.pass_3_target);
    min_not_met(
        "code_quality_score",
        metrics.code_quality_score,
        kpis.code_quality_score_target,
    );

    if metrics.gate_failure_rate > kpis.gate_failure_rate_max_per_phase {
        violations.push(ThresholdViolation {
            metric: "gate_failure_rate".to_string(),
            actual: metrics.gate_failure_rate,
            expected: kpis.gate_failure_rate_max_per_phase,
            kind: ViolationKind::MaxExceeded,
        });
    }
    if metrics.guard_violations > kpis.guard_violations_max {
        violations.push(ThresholdViolation {
            metric: "guard_violations".to_string(),
            actual: metrics.guard_violations as f64,
            expected: kpis.guard_violations_max as f64,
            kind: ViolationKind::MaxExceeded,
        });
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration(Some("30")), 30);
        assert_eq!(parse_duration(Some("30s")), 30);
        assert_eq!(parse_duration(Some("2m")), 120);
        assert_eq!(parse_duration(Some("1h")), 3600);
        assert_eq!(parse_duration(Some("abc")), 0);
        assert_eq!(parse_duration(Some("")), 0);
        assert_eq!(parse_duration(None), 0);
    }

    #[test]
    fn thresholds_met_exactly_do_not_violate() {
        let metrics = AggregatedMetrics {
            tsr: 0.8,
            pass_at_1: 0.6,
            pass_3: 0.9,
            code_quality_score: 0.7,
            total_tokens: 0.0,
            median_cycle_time: 0.0,
            gate_failure_rate: 0.1,
            guard_violations: 2,
        };
        let thresholds = ThresholdsConfig {
            pipeline_kpis: PipelineKpiTargets {
                tsr_target: 0.8,
                pass_at_1_target: 0.6,
                pass_3_target: 0.9,
                code_quality_score_target: 0.7,
                gate_failure_rate_max_per_phase: 0.1,
                guard_violations_max: 2,
            },
        };
        assert!(compare_to_thresholds(&metrics, &thresholds).is_empty());
    }
}
