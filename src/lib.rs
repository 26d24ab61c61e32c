#![forbid(unsafe_code)]

//! # refinery-harness
//!
//! Decision engine for continuous improvement of an agentic TDD pipeline
//! (RED → GREEN → REFACTOR → CODE_REVIEW → ARCH_REVIEW → DOCS).
//!
//! The crate reads the pipeline's telemetry (run reports and trace events),
//! decides *when* refinement is warranted (trigger rules over events, trends
//! and commits), grades pipeline output with a weighted composite of
//! independent graders, and judges *whether a change helped* by running
//! control and variant configurations over a golden task dataset and applying
//! a conservative accept/reject policy. Every experiment is persisted as an
//! immutable record for historical reporting.

pub mod eval;
pub mod grading;
pub mod manifest;
pub mod metrics;
pub mod telemetry;
pub mod triggers;

pub use eval::{run_experiment, EvalRunConfig};
pub use grading::calibration::{calibrate_judge, CalibrationResult};
pub use grading::composite::{grade_composite, CompositeConfig};
pub use telemetry::schemas::{
    AggregatedMetrics, AnalysisResult, CompositeResult, Decision, ExperimentResult,
    GoldenDatasetTask, RunReport, TraceEvent, TriggerResult,
};
pub use triggers::analyzer::{analyze, analyze_artifacts};
pub use triggers::config::{load_triggers_config, TriggersConfig};
