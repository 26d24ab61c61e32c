//! Golden dataset loading and task selection.

use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::telemetry::collector::CollectorError;
use crate::telemetry::schemas::{Difficulty, GoldenDatasetTask, TestType};

/// Load a JSONL golden dataset. Every line must parse; a malformed line is a
/// hard error naming the line number.
pub fn load_golden_dataset(path: impl AsRef<Path>) -> Result<Vec<GoldenDatasetTask>, CollectorError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| CollectorError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut tasks = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let task: GoldenDatasetTask = serde_json::from_str(line).map_err(|e| {
            CollectorError::Parse {
                context: format!("{}:{}", path.display(), idx + 1),
                detail: e.to_string(),
            }
        })?;
        tasks.push(task);
    }
    Ok(tasks)
}

pub fn filter_by_test_type(tasks: &[GoldenDatasetTask], test_type: TestType) -> Vec<GoldenDatasetTask> {
    tasks
        .iter()
        .filter(|t| t.test_type == test_type)
        .cloned()
        .collect()
}

pub fn filter_by_difficulty(
    tasks: &[GoldenDatasetTask],
    difficulty: Difficulty,
) -> Vec<GoldenDatasetTask> {
    tasks
        .iter()
        .filter(|t| t.difficulty == difficulty)
        .cloned()
        .collect()
}

/// Sample a quick-mode subset of `count` tasks with a seeded shuffle, so the
/// same seed picks the same subset on both branches.
pub fn sample_quick_subset(
    tasks: &[GoldenDatasetTask],
    count: usize,
    seed: u64,
) -> Vec<GoldenDatasetTask> {
    if count == 0 {
        return Vec::new();
    }
    if count >= tasks.len() {
        return tasks.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shuffled = tasks.to_vec();
    shuffled.shuffle(&mut rng);
    shuffled.truncate(count);
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::schemas::AcceptanceCriteria;

    fn task(id: &str, test_type: TestType, difficulty: Difficulty) -> GoldenDatasetTask {
        GoldenDatasetTask {
            id: id.to_string(),
            description: "desc".to_string(),
            parent_task: "parent".to_string(),
            subtask_index: 0,
            test_type,
            acceptance: AcceptanceCriteria {
                tests_must_fail_initially: true,
                tests_must_pass_after_green: true,
                no_test_modifications_in_green: true,
                static_analysis_clean: true,
                architecture_check: "layered".to_string(),
            },
            reference_solution: "ref".to_string(),
            graders: vec!["test_runner".to_string()],
            difficulty,
        }
    }

    #[test]
    fn filters_select_matching_tasks() {
        let tasks = vec![
            task("a", TestType::Unit, Difficulty::Easy),
            task("b", TestType::Integration, Difficulty::Hard),
        ];
        let unit = filter_by_test_type(&tasks, TestType::Unit);
        assert_eq!(unit.len(), 1);
        assert_eq!(unit[0].id, "a");

        let hard = filter_by_difficulty(&tasks, Difficulty::Hard);
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].id, "b");
    }

    #[test]
    fn quick_subset_is_deterministic_per_seed() {
        let tasks: Vec<_> = (0..10)
            .map(|i| task(&format!("t{i}"), TestType::Unit, Difficulty::Medium))
            .collect();
        let a = sample_quick_subset(&tasks, 4, 7);
        let b = sample_quick_subset(&tasks, 4, 7);
        let ids = |v: &[GoldenDatasetTask]| v.iter().map(|t| t.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.len(), 4);

        assert_eq!(sample_quick_subset(&tasks, 20, 7).len(), 10);
        assert!(sample_quick_subset(&tasks, 0, 7).is_empty());
    }
}
