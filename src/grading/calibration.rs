//! Rank calibration between human and automated judgments.
//!
//! Validates a scoring rubric by Spearman rank correlation over paired
//! samples; a rubric is considered calibrated at rho >= 0.80.

use serde::{Deserialize, Serialize};

/// Minimum correlation for a rubric to count as calibrated.
pub const CALIBRATION_RHO_THRESHOLD: f64 = 0.80;

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration requires at least 2 samples, got {got}")]
    TooFewSamples { got: usize },
    #[error("paired series must have the same length: {human} human vs {automated} automated")]
    LengthMismatch { human: usize, automated: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub rubric: String,
    pub spearman_correlation: f64,
    pub sample_size: usize,
    pub calibrated: bool,
}

/// Assign 1-based ranks; tied values share the mean of the ranks they would
/// jointly occupy.
fn rank_with_ties(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut pos = 0;
    while pos < n {
        let mut end = pos;
        while end + 1 < n && values[order[end + 1]] == values[order[pos]] {
            end += 1;
        }
        let avg_rank = ((pos + 1) + (end + 1)) as f64 / 2.0;
        for &idx in &order[pos..=end] {
            ranks[idx] = avg_rank;
        }
        pos = end + 1;
    }
    ranks
}

/// Spearman's rho via the rank-difference formula:
/// `rho = 1 - 6 * sum(d^2) / (n * (n^2 - 1))`.
fn spearman_rho(ranks_a: &[f64], ranks_b: &[f64]) -> f64 {
    let n = ranks_a.len() as f64;
    let sum_d_sq: f64 = ranks_a
        .iter()
        .zip(ranks_b)
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    1.0 - (6.0 * sum_d_sq) / (n * (n * n - 1.0))
}

/// Calibrate an automated judge against human scores for one rubric.
pub fn calibrate_judge(
    rubric: &str,
    human_scores: &[f64],
    automated_scores: &[f64],
) -> Result<CalibrationResult, CalibrationError> {
    if human_scores.len() < 2 {
        return Err(CalibrationError::TooFewSamples {
            got: human_scores.len(),
        });
    }
    if human_scores.len() != automated_scores.len() {
        return Err(CalibrationError::LengthMismatch {
            human: human_scores.len(),
            automated: automated_scores.len(),
        });
    }

    let human_ranks = rank_with_ties(human_scores);
    let automated_ranks = rank_with_ties(automated_scores);
    let rho = spearman_rho(&human_ranks, &automated_ranks);

    Ok(CalibrationResult {
        rubric: rubric.to_string(),
        spearman_correlation: rho,
        sample_size: human_scores.len(),
        calibrated: rho >= CALIBRATION_RHO_THRESHOLD,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_share_mean_rank() {
        let ranks = rank_with_ties(&[3.0, 1.0, 3.0]);
        assert_eq!(ranks, vec![2.5, 1.0, 2.5]);
    }

    #[test]
    fn rho_is_one_for_identical_series_with_ties() {
        let result = calibrate_judge("rubric", &[3.0, 1.0, 3.0], &[3.0, 1.0, 3.0]).unwrap();
        assert!((result.spearman_correlation - 1.0).abs() < 1e-12);
        assert!(result.calibrated);
    }
}
