//! A/B experiment orchestration.
//!
//! Runs the full task × trial grid against the control and variant
//! environments, grades each trial, aggregates per branch, and hands the
//! paired results to the comparator and decision policy. Identical
//! conditions on both sides: same task list, same trial count, same grader
//! configuration.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::eval::aggregate::aggregate_trial_results;
use crate::eval::backend::{BackendError, EnvProvisioner, ExecutionBackend, ExecutionEnv};
use crate::eval::comparator::build_task_comparisons;
use crate::eval::decision::make_decision;
use crate::grading::composite::{grade_composite, CompositeConfig, CompositeError};
use crate::manifest::{snapshot_manifest, ManifestError};
use crate::telemetry::schemas::{
    ExperimentResult, GoldenDatasetTask, TaskTrialResult, VersionManifest,
};

/// Phase count of the full pipeline; the denominator for progression scores.
pub const TOTAL_PIPELINE_PHASES: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Full description of one A/B experiment.
#[derive(Debug, Clone)]
pub struct EvalRunConfig {
    pub tasks: Vec<GoldenDatasetTask>,
    /// Trials per task per branch.
    pub trials: usize,
    pub hypothesis: String,
    pub variant_description: String,
    /// Provisioner reference for the control environment.
    pub control_ref: String,
    /// Provisioner reference for the variant environment.
    pub variant_ref: String,
    pub grader_config: CompositeConfig,
    pub dataset_version: String,
}

struct BranchRun {
    manifest: VersionManifest,
    results: Vec<TaskTrialResult>,
}

async fn run_branch(
    config: &EvalRunConfig,
    provisioner: &dyn EnvProvisioner,
    backend: &dyn ExecutionBackend,
    name: &str,
    reference: &str,
) -> Result<BranchRun, EvalError> {
    let env = provisioner.provision(name, reference).await?;
    let outcome = run_branch_in_env(config, backend, &env).await;
    // Teardown runs whether or not the grid completed.
    let teardown = provisioner.teardown(env).await;
    match outcome {
        Ok(branch) => {
            teardown?;
            Ok(branch)
        }
        Err(e) => {
            // The grid error wins; a teardown failure on this path is
            // logged rather than masking it.
            if let Err(teardown_err) = teardown {
                warn!(branch = name, error = %teardown_err, "teardown failed after branch error");
            }
            Err(e)
        }
    }
}

async fn run_branch_in_env(
    config: &EvalRunConfig,
    backend: &dyn ExecutionBackend,
    env: &ExecutionEnv,
) -> Result<BranchRun, EvalError> {
    let manifest = snapshot_manifest(&env.root, &config.dataset_version)?;

    let mut results = Vec::with_capacity(config.tasks.len() * config.trials);
    for task in &config.tasks {
        for trial in 0..config.trials {
            let execution = backend.run_trial(env, task, trial).await?;
            let composite = grade_composite(
                &config.grader_config,
                &execution.grader_results,
                execution.phases_completed as i32,
                TOTAL_PIPELINE_PHASES,
            )?;
            results.push(TaskTrialResult {
                task_id: task.id.clone(),
                trial,
                composite_result: composite,
                duration_ms: execution.duration_ms,
                agent_exit_code: execution.exit_code,
            });
        }
    }
    info!(branch = %env.name, trials = results.len(), "branch grid complete");
    Ok(BranchRun { manifest, results })
}

/// Run a complete A/B experiment and return its immutable record.
///
/// Control runs first, then variant, against the same task × trial grid.
pub async fn run_experiment(
    config: &EvalRunConfig,
    provisioner: &dyn EnvProvisioner,
    backend: &dyn ExecutionBackend,
) -> Result<ExperimentResult, EvalError> {
    let experiment_id = format!(
        "exp-{}-{}",
        Utc::now().format("%Y-%m-%d"),
        &Uuid::new_v4().simple().to_string()[..8]
    );
    info!(
        experiment_id = %experiment_id,
        tasks = config.tasks.len(),
        trials = config.trials,
        "starting experiment"
    );

    let control = run_branch(config, provisioner, backend, "control", &config.control_ref).await?;
    let variant = run_branch(config, provisioner, backend, "variant", &config.variant_ref).await?;

    let task_count = config.tasks.len();
    let control_metrics = aggregate_trial_results(&control.results, task_count);
    let variant_metrics = aggregate_trial_results(&variant.results, task_count);

    let per_task_comparison = build_task_comparisons(&control.results, &variant.results);
    let outcome = make_decision(&control_metrics, &variant_metrics, &per_task_comparison);

    info!(
        experiment_id = %experiment_id,
        decision = outcome.decision.as_str(),
        "experiment complete"
    );

    Ok(ExperimentResult {
        experiment_id,
        timestamp: Utc::now().to_rfc3339(),
        hypothesis: config.hypothesis.clone(),
        variant_description: config.variant_description.clone(),
        dataset_version: config.dataset_version.clone(),
        control_config: control.manifest,
        variant_config: variant.manifest,
        control_results: control_metrics,
        variant_results: variant_metrics,
        per_task_comparison,
        decision: outcome.decision,
        decision_rationale: outcome.rationale,
    })
}
