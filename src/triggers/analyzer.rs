//! Composes the trigger rule families over collected telemetry and derives
//! a refinement recommendation.

use std::path::Path;

use chrono::Utc;
use tracing::info;

use crate::telemetry::collector::{
    latest_baseline, read_run_reports, read_trace_events, CollectorError,
};
use crate::telemetry::schemas::{
    AggregatedMetrics, AnalysisResult, Recommendation, RunReport, Severity, TraceEvent,
};
use crate::triggers::config::TriggersConfig;
use crate::triggers::rules::{
    check_commit_based_triggers, check_event_driven_triggers, check_trend_based_triggers,
};

/// Run all trigger rules over in-memory telemetry.
///
/// Trend rules are skipped outright when runs exist but no baseline does;
/// that is a different situation from a baseline being present and no trend
/// trigger firing.
pub fn analyze(
    runs: &[RunReport],
    traces: &[TraceEvent],
    baseline: Option<&AggregatedMetrics>,
    config: &TriggersConfig,
    changed_files: &[String],
) -> AnalysisResult {
    let rules = &config.auto_refinement_triggers;

    let mut triggers_fired = check_event_driven_triggers(runs, traces, &rules.event_driven);

    let skip_trends = !runs.is_empty() && baseline.is_none();
    if !skip_trends {
        let zero = AggregatedMetrics::zero();
        let baseline = baseline.unwrap_or(&zero);
        triggers_fired.extend(check_trend_based_triggers(runs, baseline, &rules.trend_based));
    }

    triggers_fired.extend(check_commit_based_triggers(changed_files, &rules.commit_based));

    let recommendation = if triggers_fired
        .iter()
        .any(|t| t.severity == Severity::Critical)
    {
        Recommendation::Refine
    } else if !triggers_fired.is_empty() {
        Recommendation::EvalOnly
    } else {
        Recommendation::NoAction
    };

    let summary = if triggers_fired.is_empty() {
        format!(
            "Analyzed {} runs, {} traces; no triggers fired",
            runs.len(),
            traces.len()
        )
    } else {
        format!(
            "Analyzed {} runs, {} traces; {} trigger(s) fired -> {}",
            runs.len(),
            traces.len(),
            triggers_fired.len(),
            recommendation.as_str()
        )
    };

    info!(
        runs = runs.len(),
        traces = traces.len(),
        fired = triggers_fired.len(),
        "trigger analysis complete"
    );

    AnalysisResult {
        timestamp: Utc::now().to_rfc3339(),
        runs_analyzed: runs.len(),
        traces_analyzed: traces.len(),
        triggers_fired,
        recommendation,
        summary,
    }
}

/// Read telemetry from an artifacts directory and analyze it.
///
/// The baseline comes from `<artifacts>/reports`, the most recent persisted
/// experiment's control metrics.
pub fn analyze_artifacts(
    artifacts_dir: impl AsRef<Path>,
    config: &TriggersConfig,
    changed_files: &[String],
) -> Result<AnalysisResult, CollectorError> {
    let artifacts_dir = artifacts_dir.as_ref();
    let runs = read_run_reports(artifacts_dir)?;
    let traces = read_trace_events(artifacts_dir)?;
    let baseline = latest_baseline(artifacts_dir.join("reports"))?;
    Ok(analyze(
        &runs,
        &traces,
        baseline.as_ref(),
        config,
        changed_files,
    ))
}
