//! Execution seam for trial runs: backend and provisioning traits plus the
//! default process-spawning implementations.
//!
//! The pure evaluation core never spawns anything itself; it drives these
//! traits. Tests substitute scripted implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::telemetry::schemas::{GoldenDatasetTask, GraderResult};

/// Exit code recorded for a trial that hit the backend timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Relative path inside an environment where the pipeline drops per-trial
/// grader output.
pub const GRADES_FILE: &str = "artifacts/grades.json";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error in {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed grades file {path}: {detail}")]
    MalformedGrades { path: String, detail: String },
    #[error("no such environment reference: {reference}")]
    MissingEnvironment { reference: String },
}

/// An isolated, named execution environment (e.g. a branch checkout).
#[derive(Debug, Clone)]
pub struct ExecutionEnv {
    pub name: String,
    pub root: PathBuf,
}

/// Raw signal from one trial execution, before composite grading.
///
/// A timeout or crash is not masked: it arrives as a nonzero exit code with
/// whatever grader output the run managed to produce.
#[derive(Debug, Clone)]
pub struct TrialExecution {
    pub exit_code: i32,
    pub duration_ms: u64,
    pub phases_completed: u32,
    pub grader_results: BTreeMap<String, GraderResult>,
}

/// Executes one trial of one task inside an environment.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn run_trial(
        &self,
        env: &ExecutionEnv,
        task: &GoldenDatasetTask,
        trial: usize,
    ) -> Result<TrialExecution, BackendError>;
}

/// Creates and tears down isolated environments from named references.
#[async_trait]
pub trait EnvProvisioner: Send + Sync {
    async fn provision(&self, name: &str, reference: &str) -> Result<ExecutionEnv, BackendError>;
    async fn teardown(&self, env: ExecutionEnv) -> Result<(), BackendError>;
}

// =============================================================================
// Process backend
// =============================================================================

#[derive(Debug, Deserialize)]
struct GradesFile {
    #[serde(default)]
    phases_completed: u32,
    #[serde(default)]
    graders: BTreeMap<String, GraderResult>,
}

/// Runs an external coding-agent process per trial, with a hard timeout.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    pub program: String,
    pub extra_args: Vec<String>,
    pub timeout: Duration,
}

impl ProcessBackend {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            timeout,
        }
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    async fn run_trial(
        &self,
        env: &ExecutionEnv,
        task: &GoldenDatasetTask,
        trial: usize,
    ) -> Result<TrialExecution, BackendError> {
        let start = Instant::now();

        let mut command = tokio::process::Command::new(&self.program);
        command
            .arg("-p")
            .arg(&task.description)
            .args(&self.extra_args)
            .current_dir(&env.root)
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| BackendError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;

        let exit_code = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => {
                let status = status.map_err(|e| BackendError::Spawn {
                    program: self.program.clone(),
                    source: e,
                })?;
                status.code().unwrap_or(1)
            }
            Err(_) => {
                warn!(
                    task = %task.id,
                    trial,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "trial timed out; killing agent process"
                );
                let _ = child.kill().await;
                TIMEOUT_EXIT_CODE
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let (phases_completed, grader_results) = read_grades(&env.root)?;

        info!(task = %task.id, trial, exit_code, duration_ms, "trial finished");
        Ok(TrialExecution {
            exit_code,
            duration_ms,
            phases_completed,
            grader_results,
        })
    }
}

/// Read the grades file a pipeline run leaves behind. A missing file is a
/// legitimate zero-signal outcome (crashed run); a malformed one is not.
fn read_grades(root: &Path) -> Result<(u32, BTreeMap<String, GraderResult>), BackendError> {
    let path = root.join(GRADES_FILE);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((0, BTreeMap::new()));
        }
        Err(e) => {
            return Err(BackendError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    let grades: GradesFile =
        serde_json::from_str(&raw).map_err(|e| BackendError::MalformedGrades {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
    Ok((grades.phases_completed, grades.graders))
}

// =============================================================================
// Fixed-directory provisioning
// =============================================================================

/// Provisioner over pre-existing checkouts: the reference is taken as a
/// directory path. Teardown leaves the directory in place.
#[derive(Debug, Clone, Default)]
pub struct FixedDirProvisioner;

#[async_trait]
impl EnvProvisioner for FixedDirProvisioner {
    async fn provision(&self, name: &str, reference: &str) -> Result<ExecutionEnv, BackendError> {
        let root = PathBuf::from(reference);
        if !root.is_dir() {
            return Err(BackendError::MissingEnvironment {
                reference: reference.to_string(),
            });
        }
        Ok(ExecutionEnv {
            name: name.to_string(),
            root,
        })
    }

    async fn teardown(&self, _env: ExecutionEnv) -> Result<(), BackendError> {
        Ok(())
    }
}
