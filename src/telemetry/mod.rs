//! Telemetry data model and artifact collectors.

pub mod collector;
pub mod schemas;

pub use collector::{latest_baseline, read_run_reports, read_trace_events, CollectorError};
pub use schemas::{
    AggregatedMetrics, AnalysisResult, CompositeResult, Decision, ExperimentResult,
    GoldenDatasetTask, GraderResult, GuardViolationEvent, OverallStatus, PartialCreditBreakdown,
    Phase, PhaseRecord, Recommendation, RunReport, Severity, SubagentTimingEvent, TaskComparison,
    TaskOutcome, TaskTrialResult, TraceEvent, TriggerKind, TriggerResult, VersionManifest,
};
