//! Read-only access to the artifacts directory: run reports, trace events
//! and the most recent experiment baseline.
//!
//! Malformed records are a hard stop, never silently skipped; KPI correctness
//! depends on seeing the true record count.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::schemas::{AggregatedMetrics, ExperimentResult, RunReport, TraceEvent};

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {context}: {detail}")]
    Parse { context: String, detail: String },
}

impl CollectorError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn parse(context: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            detail: detail.to_string(),
        }
    }
}

/// List `*.{ext}` files directly under `dir`, sorted by path.
pub fn files_with_extension(
    dir: &Path,
    ext: &str,
) -> Result<Vec<std::path::PathBuf>, CollectorError> {
    let entries = fs::read_dir(dir).map_err(|e| CollectorError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CollectorError::io(dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read all run reports (`*.json`) from `dir`, newest first.
pub fn read_run_reports(dir: impl AsRef<Path>) -> Result<Vec<RunReport>, CollectorError> {
    let dir = dir.as_ref();
    let mut reports = Vec::new();
    for path in files_with_extension(dir, "json")? {
        let raw = fs::read_to_string(&path).map_err(|e| CollectorError::io(&path, e))?;
        let report: RunReport = serde_json::from_str(&raw)
            .map_err(|e| CollectorError::parse(path.display().to_string(), e))?;
        reports.push(report);
    }
    reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    debug!(count = reports.len(), dir = %dir.display(), "read run reports");
    Ok(reports)
}

/// Read all trace events (`*.jsonl`) from `dir`, in file order.
///
/// Errors name the offending `file:line`.
pub fn read_trace_events(dir: impl AsRef<Path>) -> Result<Vec<TraceEvent>, CollectorError> {
    let dir = dir.as_ref();
    let mut events = Vec::new();
    for path in files_with_extension(dir, "jsonl")? {
        let raw = fs::read_to_string(&path).map_err(|e| CollectorError::io(&path, e))?;
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: TraceEvent = serde_json::from_str(line).map_err(|e| {
                CollectorError::parse(format!("{}:{}", path.display(), idx + 1), e)
            })?;
            events.push(event);
        }
    }
    Ok(events)
}

/// Control-branch metrics of the most recent persisted experiment, if any.
///
/// Returns `Ok(None)` when the directory holds no experiment records; a
/// record that fails to parse is still a hard error.
pub fn latest_baseline(
    reports_dir: impl AsRef<Path>,
) -> Result<Option<AggregatedMetrics>, CollectorError> {
    let dir = reports_dir.as_ref();
    if !dir.exists() {
        return Ok(None);
    }

    let mut experiments: Vec<ExperimentResult> = Vec::new();
    for path in files_with_extension(dir, "json")? {
        let raw = fs::read_to_string(&path).map_err(|e| CollectorError::io(&path, e))?;
        let exp: ExperimentResult = serde_json::from_str(&raw)
            .map_err(|e| CollectorError::parse(path.display().to_string(), e))?;
        experiments.push(exp);
    }

    experiments.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(experiments.into_iter().next().map(|e| e.control_results))
}
