#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use refinery_harness::eval::backend::{FixedDirProvisioner, ProcessBackend};
use refinery_harness::eval::comparator::build_comparison_report;
use refinery_harness::eval::dataset::{load_golden_dataset, sample_quick_subset};
use refinery_harness::eval::reporter::{
    format_history_table, format_markdown_report, load_experiment_history, save_report,
};
use refinery_harness::eval::runner::{run_experiment, EvalRunConfig};
use refinery_harness::grading::calibration::calibrate_judge;
use refinery_harness::grading::composite::CompositeConfig;
use refinery_harness::metrics::{
    compare_to_thresholds, compute_pipeline_kpis, compute_role_metrics, ThresholdsConfig,
};
use refinery_harness::telemetry::collector::{latest_baseline, read_run_reports};
use refinery_harness::triggers::analyzer::analyze_artifacts;
use refinery_harness::triggers::config::load_triggers_config;

#[derive(Parser)]
#[command(name = "refinery", version, about = "Pipeline refinement harness CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze collected telemetry and report which refinement triggers fired
    Analyze {
        /// Artifacts directory holding run reports and trace files
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
        /// Triggers config (YAML)
        #[arg(long, default_value = "triggers.yaml")]
        config: PathBuf,
        /// Changed file paths for commit-based rules (comma-separated)
        #[arg(long, value_delimiter = ',')]
        changed_files: Option<Vec<String>>,
        /// Write the analysis result JSON here as well as stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run an A/B experiment over the golden dataset
    Eval {
        /// Golden dataset JSONL
        #[arg(long)]
        dataset: PathBuf,
        /// Control environment directory
        #[arg(long)]
        control: PathBuf,
        /// Variant environment directory
        #[arg(long)]
        variant: PathBuf,
        /// Trials per task per branch
        #[arg(long, default_value_t = 3)]
        trials: usize,
        #[arg(long)]
        hypothesis: String,
        #[arg(long)]
        variant_description: String,
        /// Agent program to spawn per trial
        #[arg(long, default_value = "claude")]
        agent: String,
        /// Per-trial timeout in seconds
        #[arg(long, default_value_t = 1800)]
        timeout_secs: u64,
        /// Quick mode: run only this many sampled tasks
        #[arg(long)]
        quick: Option<usize>,
        /// Seed for quick-mode sampling
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "v1")]
        dataset_version: String,
        /// Directory for persisted experiment records and reports
        #[arg(long, default_value = "artifacts/reports")]
        reports_dir: PathBuf,
    },
    /// Show experiment reports
    Report {
        #[arg(long, default_value = "artifacts/reports")]
        reports_dir: PathBuf,
        /// Show the full history table instead of the latest experiment
        #[arg(long)]
        history: bool,
        /// Show a specific experiment by id
        #[arg(long)]
        id: Option<String>,
    },
    /// Compute descriptive KPIs over collected run reports
    Metrics {
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
        /// Include the per-role metric breakdown
        #[arg(long)]
        roles: bool,
        /// Check the latest experiment baseline against these thresholds (YAML)
        #[arg(long)]
        thresholds: Option<PathBuf>,
    },
    /// Calibrate an automated judge against human scores
    Calibrate {
        /// Rubric name for the calibration record
        #[arg(long)]
        rubric: String,
        /// JSON array of human scores
        #[arg(long)]
        human: PathBuf,
        /// JSON array of automated scores, same task order
        #[arg(long)]
        automated: PathBuf,
    },
}

fn read_scores(path: &PathBuf) -> Result<Vec<f64>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            artifacts,
            config,
            changed_files,
            out,
        } => {
            let config = load_triggers_config(&config)?;
            let changed = changed_files.unwrap_or_default();
            let result = analyze_artifacts(&artifacts, &config, &changed)?;
            let json = serde_json::to_string_pretty(&result)?;
            if let Some(out) = out {
                std::fs::write(&out, &json)?;
            }
            println!("{json}");
        }
        Commands::Eval {
            dataset,
            control,
            variant,
            trials,
            hypothesis,
            variant_description,
            agent,
            timeout_secs,
            quick,
            seed,
            dataset_version,
            reports_dir,
        } => {
            let mut tasks = load_golden_dataset(&dataset)?;
            if let Some(count) = quick {
                tasks = sample_quick_subset(&tasks, count, seed);
            }
            if tasks.is_empty() {
                return Err("dataset is empty; nothing to evaluate".into());
            }

            let config = EvalRunConfig {
                tasks,
                trials,
                hypothesis,
                variant_description,
                control_ref: control.display().to_string(),
                variant_ref: variant.display().to_string(),
                grader_config: CompositeConfig::default_weights(),
                dataset_version,
            };
            let provisioner = FixedDirProvisioner;
            let backend = ProcessBackend::new(agent, Duration::from_secs(timeout_secs));

            let result = run_experiment(&config, &provisioner, &backend).await?;
            let report = build_comparison_report(&result);
            let (json_path, md_path) = save_report(&result, &report, &reports_dir)?;

            println!("{}", report.net_assessment);
            println!("record: {}", json_path.display());
            println!("report: {}", md_path.display());
        }
        Commands::Report {
            reports_dir,
            history,
            id,
        } => {
            let experiments = load_experiment_history(&reports_dir)?;
            if history {
                println!("{}", format_history_table(&experiments));
            } else {
                let selected = match id {
                    Some(id) => experiments.iter().find(|e| e.experiment_id == id),
                    None => experiments.first(),
                };
                match selected {
                    Some(exp) => {
                        let report = build_comparison_report(exp);
                        println!("{}", format_markdown_report(exp, &report));
                    }
                    None => println!("no experiments recorded yet"),
                }
            }
        }
        Commands::Metrics {
            artifacts,
            roles,
            thresholds,
        } => {
            let reports = read_run_reports(&artifacts)?;
            let kpis = compute_pipeline_kpis(&reports);
            println!("{}", serde_json::to_string_pretty(&kpis)?);

            if roles {
                let role_metrics = compute_role_metrics(&reports);
                println!("{}", serde_json::to_string_pretty(&role_metrics)?);
            }

            if let Some(thresholds_path) = thresholds {
                let raw = std::fs::read_to_string(&thresholds_path)?;
                let thresholds: ThresholdsConfig = serde_yaml::from_str(&raw)?;
                match latest_baseline(artifacts.join("reports"))? {
                    Some(baseline) => {
                        let violations = compare_to_thresholds(&baseline, &thresholds);
                        if violations.is_empty() {
                            println!("all thresholds met");
                        } else {
                            println!("{}", serde_json::to_string_pretty(&violations)?);
                        }
                    }
                    None => println!("no experiment baseline; skipping threshold check"),
                }
            }
        }
        Commands::Calibrate {
            rubric,
            human,
            automated,
        } => {
            let human_scores = read_scores(&human)?;
            let automated_scores = read_scores(&automated)?;
            let result = calibrate_judge(&rubric, &human_scores, &automated_scores)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
