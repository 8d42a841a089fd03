//! Per-invocation scratch directories
//!
//! Every extract-and-run gets a unique directory under the configured
//! scratch root. The guard removes it on drop, so cleanup holds on every
//! exit path of the pipeline.

use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};
use std::path::{Path, PathBuf};

/// Directory name for a template build, `<project>_creation_<epoch_ms>`.
pub fn creation_dir_name(project: &str) -> String {
    format!("{}_creation_{}", project, Utc::now().timestamp_millis())
}

/// Directory name for a submission run,
/// `<project>_submission_<epoch_ms>_<rand>`. The random suffix keeps
/// same-millisecond submissions apart.
pub fn submission_dir_name(project: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!(
        "{}_submission_{}_{}",
        project,
        Utc::now().timestamp_millis(),
        suffix
    )
}

/// A scratch directory removed when the guard goes out of scope.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `root/name`, creating the root first if needed.
    pub fn create(root: &Path, name: &str) -> std::io::Result<Self> {
        let path = root.join(name);
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory's own name (also used as the container name).
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchDir::create(root.path(), "proj_submission_1").unwrap();
            std::fs::write(scratch.path().join("file.txt"), "data").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_survives_manual_removal() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path(), "gone").unwrap();
        std::fs::remove_dir_all(scratch.path()).unwrap();
        // Drop must not panic when the directory is already gone.
        drop(scratch);
    }

    #[test]
    fn test_creation_name_shape() {
        let name = creation_dir_name("counter");
        assert!(name.starts_with("counter_creation_"));
    }

    #[test]
    fn test_submission_names_unique() {
        let a = submission_dir_name("counter");
        let b = submission_dir_name("counter");
        assert!(a.starts_with("counter_submission_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_name_accessor() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path(), "counter_submission_42_abc").unwrap();
        assert_eq!(scratch.name(), "counter_submission_42_abc");
    }
}
