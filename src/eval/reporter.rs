//! Persistence and markdown rendering of experiment records.

use std::path::{Path, PathBuf};

use crate::eval::comparator::ComparisonReport;
use crate::telemetry::collector::{files_with_extension, CollectorError};
use crate::telemetry::schemas::{Decision, ExperimentResult};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize experiment record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load every persisted experiment record under `dir`, newest first.
/// A missing directory is an empty history.
pub fn load_experiment_history(dir: impl AsRef<Path>) -> Result<Vec<ExperimentResult>, CollectorError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut history = Vec::new();
    for path in files_with_extension(dir, "json")? {
        let raw = std::fs::read_to_string(&path).map_err(|e| CollectorError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let record: ExperimentResult =
            serde_json::from_str(&raw).map_err(|e| CollectorError::Parse {
                context: path.display().to_string(),
                detail: e.to_string(),
            })?;
        history.push(record);
    }
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(history)
}

/// Render the experiment history as a markdown table, newest first.
pub fn format_history_table(history: &[ExperimentResult]) -> String {
    let mut out = String::from("# Experiment History\n\n");
    if history.is_empty() {
        out.push_str("No experiments recorded yet.\n");
        return out;
    }
    out.push_str("| Date | Experiment | TSR | pass@1 | Guard Violations | Decision |\n");
    out.push_str("|------|------------|-----|--------|------------------|----------|\n");
    for exp in history {
        let date = exp.timestamp.get(..10).unwrap_or(&exp.timestamp);
        let marker = if exp.decision == Decision::Accept {
            " \u{2713}"
        } else {
            ""
        };
        out.push_str(&format!(
            "| {} | {} | {:.1}% | {:.1}% | {} | {}{} |\n",
            date,
            exp.experiment_id,
            exp.variant_results.tsr * 100.0,
            exp.variant_results.pass_at_1 * 100.0,
            exp.variant_results.guard_violations,
            exp.decision.as_str(),
            marker,
        ));
    }
    out
}

fn format_delta(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{:.4}", delta)
    } else {
        format!("{:.4}", delta)
    }
}

/// Render one experiment plus its comparison view as a markdown report.
pub fn format_markdown_report(result: &ExperimentResult, report: &ComparisonReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Experiment {}\n\n", result.experiment_id));
    out.push_str(&format!("**Date:** {}\n\n", result.timestamp));
    out.push_str(&format!("**Hypothesis:** {}\n\n", result.hypothesis));
    out.push_str(&format!("**Variant:** {}\n\n", result.variant_description));
    out.push_str(&format!("**Dataset:** {}\n\n", result.dataset_version));

    out.push_str("## Results Summary\n\n");
    out.push_str("| Metric | Control | Variant | Delta |\n");
    out.push_str("|--------|---------|---------|-------|\n");
    let control = &report.control_metrics;
    let variant = &report.variant_metrics;
    let rows: [(&str, f64, f64); 8] = [
        ("tsr", control.tsr, variant.tsr),
        ("pass_at_1", control.pass_at_1, variant.pass_at_1),
        ("pass_3", control.pass_3, variant.pass_3),
        (
            "code_quality_score",
            control.code_quality_score,
            variant.code_quality_score,
        ),
        ("total_tokens", control.total_tokens, variant.total_tokens),
        (
            "median_cycle_time",
            control.median_cycle_time,
            variant.median_cycle_time,
        ),
        (
            "gate_failure_rate",
            control.gate_failure_rate,
            variant.gate_failure_rate,
        ),
        (
            "guard_violations",
            control.guard_violations as f64,
            variant.guard_violations as f64,
        ),
    ];
    for (name, c, v) in rows {
        out.push_str(&format!(
            "| {} | {:.4} | {:.4} | {} |\n",
            name,
            c,
            v,
            format_delta(v - c)
        ));
    }
    out.push('\n');

    if !report.regressions.is_empty() {
        out.push_str("## Regressions\n\n");
        for t in &report.regressions {
            out.push_str(&format!(
                "- `{}`: {:.4} -> {:.4} (delta {})\n",
                t.task_id,
                t.control_score,
                t.variant_score,
                format_delta(t.delta)
            ));
        }
        out.push('\n');
    }

    if !report.improvements.is_empty() {
        out.push_str("## Improvements\n\n");
        for t in &report.improvements {
            out.push_str(&format!(
                "- `{}`: {:.4} -> {:.4} (delta {})\n",
                t.task_id,
                t.control_score,
                t.variant_score,
                format_delta(t.delta)
            ));
        }
        out.push('\n');
    }

    out.push_str("## Decision\n\n");
    out.push_str(&format!("{}\n", report.net_assessment));
    out
}

/// Persist one experiment as both a JSON record and a markdown report.
/// Returns the (json, markdown) paths written.
pub fn save_report(
    result: &ExperimentResult,
    report: &ComparisonReport,
    reports_dir: impl AsRef<Path>,
) -> Result<(PathBuf, PathBuf), ReportError> {
    let reports_dir = reports_dir.as_ref();
    std::fs::create_dir_all(reports_dir).map_err(|e| ReportError::Io {
        path: reports_dir.display().to_string(),
        source: e,
    })?;

    let json_path = reports_dir.join(format!("{}.json", result.experiment_id));
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(&json_path, json).map_err(|e| ReportError::Io {
        path: json_path.display().to_string(),
        source: e,
    })?;

    let md_path = reports_dir.join(format!("{}.md", result.experiment_id));
    let markdown = format_markdown_report(result, report);
    std::fs::write(&md_path, markdown).map_err(|e| ReportError::Io {
        path: md_path.display().to_string(),
        source: e,
    })?;

    Ok((json_path, md_path))
}
