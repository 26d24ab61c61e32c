//! Configuration fingerprinting for experiment environments.
//!
//! An experiment record must pin down exactly which prompts, skills, hooks
//! and settings each branch ran with. We hash the configuration surface with
//! blake3 in a deterministic file order so two identical trees always produce
//! the same manifest.

use std::path::{Path, PathBuf};

use crate::telemetry::schemas::VersionManifest;

const AGENTS_DIR: &str = ".claude/agents";
const SKILLS_DIR: &str = ".claude/skills";
const HOOKS_DIR: &str = ".claude/hooks";
const SETTINGS_FILE: &str = ".claude/settings.json";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Recursively collect files under `dir`, sorted by path. A missing directory
/// yields the empty set rather than an error.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, ManifestError> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| io_err(&current, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Hash the concatenated contents of `paths` in the given order.
pub fn hash_files(paths: &[PathBuf]) -> Result<String, ManifestError> {
    let mut hasher = blake3::Hasher::new();
    for path in paths {
        let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_dir(root: &Path, subdir: &str) -> Result<String, ManifestError> {
    let files = collect_files(&root.join(subdir))?;
    hash_files(&files)
}

/// Fingerprint the configuration surface of an environment rooted at `root`.
pub fn snapshot_manifest(
    root: &Path,
    dataset_version: &str,
) -> Result<VersionManifest, ManifestError> {
    let settings = root.join(SETTINGS_FILE);
    let settings_files = if settings.is_file() {
        vec![settings]
    } else {
        Vec::new()
    };

    Ok(VersionManifest {
        agent_prompts_hash: hash_dir(root, AGENTS_DIR)?,
        skill_hash: hash_dir(root, SKILLS_DIR)?,
        hooks_hash: hash_dir(root, HOOKS_DIR)?,
        settings_hash: hash_files(&settings_files)?,
        dataset_version: dataset_version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_hashes_are_stable() {
        let a = hash_files(&[]).unwrap();
        let b = hash_files(&[]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn missing_directory_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = collect_files(&dir.path().join("no-such-subdir")).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn file_content_changes_the_hash() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("prompt.md");
        std::fs::write(&file, "v1").unwrap();
        let h1 = hash_files(&[file.clone()]).unwrap();
        std::fs::write(&file, "v2").unwrap();
        let h2 = hash_files(&[file]).unwrap();
        assert_ne!(h1, h2);
    }
}
