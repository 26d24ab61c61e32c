//! Accept/reject policy over aggregated KPIs and per-task regressions.

use crate::telemetry::schemas::{AggregatedMetrics, Decision, TaskComparison};

/// Maximum tolerated fraction of regressed tasks before outright rejection.
pub const REGRESSION_RATE_LIMIT: f64 = 0.20;

/// A decision plus the reasoning behind it. The rationale is never empty.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub rationale: String,
}

/// Decide whether to adopt the variant configuration.
///
/// Rejection comes first: any of {tsr, pass_at_1, code_quality_score}
/// strictly worse than control, or a regression rate above 20%, rejects
/// regardless of everything else. A clean sweep with a nonzero regression
/// rate at or under 20% is accepted with a caveat.
pub fn make_decision(
    control: &AggregatedMetrics,
    variant: &AggregatedMetrics,
    comparisons: &[TaskComparison],
) -> DecisionOutcome {
    let regression_rate = if comparisons.is_empty() {
        0.0
    } else {
        comparisons.iter().filter(|c| c.regression).count() as f64 / comparisons.len() as f64
    };

    let any_metric_worse = variant.tsr < control.tsr
        || variant.pass_at_1 < control.pass_at_1
        || variant.code_quality_score < control.code_quality_score;

    if any_metric_worse || regression_rate > REGRESSION_RATE_LIMIT {
        let mut reasons = Vec::new();
        if variant.tsr < control.tsr {
            reasons.push(format!("tsr degraded ({} -> {})", control.tsr, variant.tsr));
        }
        if variant.pass_at_1 < control.pass_at_1 {
            reasons.push(format!(
                "pass_at_1 degraded ({} -> {})",
                control.pass_at_1, variant.pass_at_1
            ));
        }
        if variant.code_quality_score < control.code_quality_score {
            reasons.push(format!(
                "code_quality_score degraded ({} -> {})",
                control.code_quality_score, variant.code_quality_score
            ));
        }
        if regression_rate > REGRESSION_RATE_LIMIT {
            reasons.push(format!(
                "regression rate {:.1}% exceeds 20% threshold",
                regression_rate * 100.0
            ));
        }
        return DecisionOutcome {
            decision: Decision::Reject,
            rationale: format!("Rejected: {}", reasons.join("; ")),
        };
    }

    if regression_rate > 0.0 {
        return DecisionOutcome {
            decision: Decision::AcceptWithCaveat,
            rationale: format!(
                "Accepted with caveat: all key metrics improved or held, but {:.1}% of tasks \
                 regressed (within 20% threshold)",
                regression_rate * 100.0
            ),
        };
    }

    DecisionOutcome {
        decision: Decision::Accept,
        rationale: "Accepted: all key metrics (tsr, pass_at_1, code_quality_score) are >= \
                    control with zero task regressions"
            .to_string(),
    }
}
