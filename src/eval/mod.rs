//! A/B evaluation: dataset selection, trial execution, aggregation,
//! comparison, decision policy and reporting.

pub mod aggregate;
pub mod backend;
pub mod comparator;
pub mod dataset;
pub mod decision;
pub mod reporter;
pub mod runner;

pub use aggregate::aggregate_trial_results;
pub use backend::{
    EnvProvisioner, ExecutionBackend, ExecutionEnv, FixedDirProvisioner, ProcessBackend,
    TrialExecution,
};
pub use comparator::{build_comparison_report, build_task_comparisons, ComparisonReport};
pub use dataset::{load_golden_dataset, sample_quick_subset};
pub use decision::{make_decision, DecisionOutcome};
pub use reporter::{format_history_table, load_experiment_history, save_report};
pub use runner::{run_experiment, EvalError, EvalRunConfig};
