//! Wire shapes for pipeline telemetry, trigger signals and experiment records.
//!
//! Everything here is plain serde data: run reports and trace events are
//! produced by the pipeline and consumed read-only by this crate; experiment
//! records are produced here and persisted for historical reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// Pipeline run reports
// =============================================================================

/// One phase of the RED→GREEN→REFACTOR→CODE_REVIEW→ARCH_REVIEW→DOCS pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Red,
    Green,
    Refactor,
    CodeReview,
    ArchReview,
    Docs,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: [Phase; 6] = [
        Phase::Red,
        Phase::Green,
        Phase::Refactor,
        Phase::CodeReview,
        Phase::ArchReview,
        Phase::Docs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Red => "RED",
            Phase::Green => "GREEN",
            Phase::Refactor => "REFACTOR",
            Phase::CodeReview => "CODE_REVIEW",
            Phase::ArchReview => "ARCH_REVIEW",
            Phase::Docs => "DOCS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateResult {
    Pass,
    Fail,
}

/// Record of a single phase within one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub retries: u32,
    pub gate_result: GateResult,
    /// Reason for the last gate failure, if any.
    pub gate_failure_reason: Option<String>,
    pub changed_files: Vec<String>,
    /// Duration string `"<int>[s|m|h]"`; unit defaults to seconds.
    pub duration_estimate: Option<String>,
}

/// Escalation raised while routing review fixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub phase: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_request_id: Option<String>,
}

/// Counts of review-fix cycles plus any escalations out of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRoutingRecord {
    pub code_review_cycles: u32,
    pub arch_review_cycles: u32,
    pub escalations: Vec<EscalationEvent>,
}

/// A guard hook firing on an attempted file edit during a protected phase.
///
/// Only `blocked = true` entries count as real violations for grading; all
/// entries remain visible to trigger telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardViolationEvent {
    pub timestamp: String,
    pub agent: String,
    pub attempted_action: String,
    pub target_file: String,
    pub blocked: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Done,
    Failed,
    Escalated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    Unit,
    Integration,
    Both,
}

/// One completed pipeline execution. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub timestamp: String,
    pub task_id: String,
    pub subtask_id: String,
    pub feature: String,
    pub test_type: TestType,
    pub phases: Vec<PhaseRecord>,
    pub fix_routing: FixRoutingRecord,
    pub guard_violations: Vec<GuardViolationEvent>,
    pub overall_status: OverallStatus,
    /// Partial-credit score in [0, 1].
    pub partial_credit_score: f64,
    /// Total tokens consumed by the run, when the host recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<f64>,
}

// =============================================================================
// Trace events
// =============================================================================

/// Per-subagent timing record emitted by the host telemetry hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentTimingEvent {
    pub timestamp: String,
    pub agent: String,
    pub phase: String,
    pub started_at: String,
    pub finished_at: String,
    pub tool_calls_count: f64,
}

/// A single line of the trace stream, keyed by shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceEvent {
    Timing(SubagentTimingEvent),
    Violation(GuardViolationEvent),
}

// =============================================================================
// Trigger signals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    EventDriven,
    TrendBased,
    CommitBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One fired trigger signal. Ephemeral: produced by rules, consumed by the
/// analyzer, never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResult {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    pub rule: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_agent: Option<String>,
    /// Free-form supporting data, keyed per rule.
    pub evidence: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Refine,
    EvalOnly,
    NoAction,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Refine => "refine",
            Recommendation::EvalOnly => "eval_only",
            Recommendation::NoAction => "no_action",
        }
    }
}

/// Outcome of one analyzer pass over collected telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub timestamp: String,
    pub runs_analyzed: usize,
    pub traces_analyzed: usize,
    pub triggers_fired: Vec<TriggerResult>,
    pub recommendation: Recommendation,
    pub summary: String,
}

// =============================================================================
// Grading
// =============================================================================

/// One independent grader's verdict on a trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraderResult {
    pub grader: String,
    /// Score in [0, 1].
    pub score: f64,
    pub pass: bool,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Breakdown of how a composite score was assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialCreditBreakdown {
    pub phases_completed: i32,
    pub phases_total: u32,
    pub phase_progression_score: f64,
    pub grader_ensemble_score: f64,
    pub final_score: f64,
}

/// Combined grading verdict for one trial.
///
/// Invariant: `overall_score == partial_credit.final_score` exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResult {
    pub overall_score: f64,
    pub pass: bool,
    pub individual_scores: BTreeMap<String, GraderResult>,
    pub partial_credit: PartialCreditBreakdown,
}

// =============================================================================
// Evaluation
// =============================================================================

/// One (task, trial) execution on one branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTrialResult {
    pub task_id: String,
    pub trial: usize,
    pub composite_result: CompositeResult,
    pub duration_ms: u64,
    pub agent_exit_code: i32,
}

/// Branch-level KPI vector; the unit of comparison between control and
/// variant. Rates live in [0, 1], counts are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub tsr: f64,
    pub pass_at_1: f64,
    pub pass_3: f64,
    pub code_quality_score: f64,
    pub total_tokens: f64,
    pub median_cycle_time: f64,
    pub gate_failure_rate: f64,
    pub guard_violations: u64,
}

impl AggregatedMetrics {
    /// The all-zero vector used for empty inputs and missing baselines.
    pub fn zero() -> Self {
        Self {
            tsr: 0.0,
            pass_at_1: 0.0,
            pass_3: 0.0,
            code_quality_score: 0.0,
            total_tokens: 0.0,
            median_cycle_time: 0.0,
            gate_failure_rate: 0.0,
            guard_violations: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Pass,
    Fail,
    Partial,
}

/// Per-task control/variant outcome pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComparison {
    pub task_id: String,
    pub control_outcome: TaskOutcome,
    pub variant_outcome: TaskOutcome,
    pub control_score: f64,
    pub variant_score: f64,
    /// variant best − control best.
    pub delta: f64,
    pub regression: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
    AcceptWithCaveat,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Reject => "reject",
            Decision::AcceptWithCaveat => "accept_with_caveat",
        }
    }
}

/// Stable fingerprint of an environment's configuration surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    pub agent_prompts_hash: String,
    pub skill_hash: String,
    pub hooks_hash: String,
    pub settings_hash: String,
    pub dataset_version: String,
}

/// One completed A/B experiment. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub experiment_id: String,
    pub timestamp: String,
    pub hypothesis: String,
    pub variant_description: String,
    pub dataset_version: String,
    pub control_config: VersionManifest,
    pub variant_config: VersionManifest,
    pub control_results: AggregatedMetrics,
    pub variant_results: AggregatedMetrics,
    pub per_task_comparison: Vec<TaskComparison>,
    pub decision: Decision,
    pub decision_rationale: String,
}

// =============================================================================
// Golden dataset
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Adversarial,
}

/// Acceptance criteria attached to a golden dataset task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptanceCriteria {
    pub tests_must_fail_initially: bool,
    pub tests_must_pass_after_green: bool,
    pub no_test_modifications_in_green: bool,
    pub static_analysis_clean: bool,
    pub architecture_check: String,
}

/// One task of the golden evaluation dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenDatasetTask {
    pub id: String,
    pub description: String,
    pub parent_task: String,
    pub subtask_index: u32,
    pub test_type: TestType,
    pub acceptance: AcceptanceCriteria,
    pub reference_solution: String,
    pub graders: Vec<String>,
    pub difficulty: Difficulty,
}
