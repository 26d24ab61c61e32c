//! Composite grading: weighted grader ensemble blended with phase progression.
//!
//! The 0.4/0.6 split is a fixed design constant. Phase progression alone can
//! contribute at most 0.4 and grader quality alone at most 0.6, so a trial
//! must show both forward progress and quality signal to pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::telemetry::schemas::{CompositeResult, GraderResult, PartialCreditBreakdown};

/// Weight share of phase progression in the final score.
pub const PROGRESSION_WEIGHT: f64 = 0.4;
/// Weight share of the grader ensemble in the final score.
pub const ENSEMBLE_WEIGHT: f64 = 0.6;
/// Minimum final score for a trial to pass.
pub const PASS_THRESHOLD: f64 = 0.5;
/// Allowed drift of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("grader weights must sum to 1.0 (±{WEIGHT_SUM_TOLERANCE}), got {sum}")]
    WeightSum { sum: f64 },
}

/// Named grader weights; must sum to 1.0 within tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub weights: BTreeMap<String, f64>,
}

impl CompositeConfig {
    /// The default production grader mix.
    pub fn default_weights() -> Self {
        let weights = [
            ("test_runner", 0.30),
            ("static_analysis", 0.15),
            ("test_mutation", 0.15),
            ("guard_compliance", 0.10),
            ("llm_test_quality", 0.10),
            ("llm_impl_minimality", 0.10),
            ("llm_doc_completeness", 0.10),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { weights }
    }
}

/// Combine individual grader results with phase progression into one score.
///
/// Graders missing from `results` contribute a score of 0 for their weight;
/// this never errors on missing keys. `phases_total == 0` yields a
/// progression of 0 rather than dividing by zero, and `phases_completed`
/// outside `[0, phases_total]` clamps.
pub fn grade_composite(
    config: &CompositeConfig,
    results: &BTreeMap<String, GraderResult>,
    phases_completed: i32,
    phases_total: u32,
) -> Result<CompositeResult, CompositeError> {
    let weight_sum: f64 = config.weights.values().sum();
    if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(CompositeError::WeightSum { sum: weight_sum });
    }

    let grader_ensemble_score: f64 = config
        .weights
        .iter()
        .map(|(name, weight)| weight * results.get(name).map_or(0.0, |r| r.score))
        .sum();

    let phase_progression_score = if phases_total == 0 {
        0.0
    } else {
        (phases_completed as f64 / phases_total as f64).clamp(0.0, 1.0)
    };

    let final_score =
        phase_progression_score * PROGRESSION_WEIGHT + grader_ensemble_score * ENSEMBLE_WEIGHT;

    Ok(CompositeResult {
        overall_score: final_score,
        pass: final_score >= PASS_THRESHOLD,
        individual_scores: results.clone(),
        partial_credit: PartialCreditBreakdown {
            phases_completed,
            phases_total,
            phase_progression_score,
            grader_ensemble_score,
            final_score,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_sum_outside_tolerance_fails_fast() {
        let mut config = CompositeConfig::default_weights();
        config.weights.insert("test_runner".to_string(), 0.50);
        let err = grade_composite(&config, &BTreeMap::new(), 0, 6).unwrap_err();
        assert!(matches!(err, CompositeError::WeightSum { .. }));
    }

    #[test]
    fn overall_score_matches_breakdown_exactly() {
        let config = CompositeConfig::default_weights();
        let result = grade_composite(&config, &BTreeMap::new(), 3, 6).unwrap();
        assert_eq!(result.overall_score, result.partial_credit.final_score);
    }
}
