//! Project image lifecycle
//!
//! One sandbox image per project, built from an uploaded template archive.
//! The build pipeline is linear: validate → extract → overlay → build →
//! baseline discovery → persist, with the scratch directory removed on
//! every exit path and the partial image torn down on failure.

use crate::{
    creation_dir_name, extract_archive, parse_gas_snapshot, validate_template_tree,
    ContainerExecution, CoreError, ExecutionPurpose, Project, ProjectConfig, Repository, Result,
    ScratchDir,
};
use chrono::Utc;
use solgrade_engine::{ContainerEngine, ImageBuildRequest, SandboxRun, SandboxStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Container build file baked into every project image. Caller-supplied
/// files of the same name never win.
pub const TEMPLATE_DOCKERFILE: &str = include_str!("../templates/Dockerfile");

/// Entrypoint script overlaid onto the template unless the caller ships
/// its own.
pub const TEMPLATE_ENTRYPOINT: &str = include_str!("../templates/entrypoint.sh");

/// Entrypoint mode that prints the gas snapshot and purposely stops.
pub const SNAPSHOT_MODE: &str = "snapshot";

/// Entrypoint mode that overlays a mounted submission and compares
/// snapshots.
pub const COMPARE_MODE: &str = "compare";

/// Result of a successful template build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub project: Project,
    pub execution: ContainerExecution,
}

/// Builds and tracks one sandbox image per project.
pub struct ImageManager {
    engine: Arc<dyn ContainerEngine>,
    repo: Arc<dyn Repository>,
    scratch_root: PathBuf,
    default_timeout: Duration,
    /// Per-project build/replace/remove critical section.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ImageManager {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        repo: Arc<dyn Repository>,
        scratch_root: PathBuf,
        default_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            repo,
            scratch_root,
            default_timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Image tag for a project.
    pub fn image_tag(project: &str) -> String {
        format!("{project}:latest")
    }

    async fn project_lock(&self, project: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Build (or rebuild) the project image from a template archive and
    /// discover its baseline test roster.
    ///
    /// Builds of the same project are serialized; readers observe either
    /// the previous image or the new one, never a partial state.
    pub async fn build(
        &self,
        project_name: &str,
        archive: &[u8],
        config: Option<&ProjectConfig>,
    ) -> Result<BuildOutcome> {
        validate_project_name(project_name)?;

        let lock = self.project_lock(project_name).await;
        let _guard = lock.lock().await;

        let scratch = ScratchDir::create(&self.scratch_root, &creation_dir_name(project_name))?;
        extract_archive(archive, scratch.path())?;
        let project_root = validate_template_tree(scratch.path())?;
        overlay_template_files(&project_root)?;

        let tag = Self::image_tag(project_name);
        let request = ImageBuildRequest {
            context_dir: project_root,
            tag: tag.clone(),
            labels: HashMap::from([("solgrade.project".to_string(), project_name.to_string())]),
        };

        tracing::info!(project = project_name, "building project image");
        let image_id = match self.engine.build_image(&request).await {
            Ok(id) => id,
            Err(e) => {
                self.remove_image_quietly(&tag).await;
                return Err(e.into());
            }
        };

        let timeout = config
            .and_then(|c| c.container_timeout)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let run = SandboxRun {
            name: scratch.name().to_string(),
            image: tag.clone(),
            cmd: vec![SNAPSHOT_MODE.to_string()],
            src_mount: None,
            timeout,
        };

        let outcome = match self.engine.run_sandbox(&run).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.remove_image_quietly(&tag).await;
                return Err(e.into());
            }
        };

        if outcome.status != SandboxStatus::PurposelyStopped {
            self.remove_image_quietly(&tag).await;
            return Err(CoreError::BaselineDiscovery(format!(
                "discovery container exited with {} (code {})",
                outcome.status, outcome.exit_code
            )));
        }

        let report = parse_gas_snapshot(&outcome.stdout);
        let baseline_tests = report.test_names();

        let mut execution = ContainerExecution::new(project_name, ExecutionPurpose::ProjectCreation);
        execution.status = outcome.status.into();
        execution.exit_code = outcome.exit_code;
        execution.elapsed_ms = outcome.elapsed.as_millis() as u64;
        execution.started_at = outcome.started_at;
        execution.finished_at = outcome.finished_at;
        execution.output = report;
        self.repo.record_execution(&execution).await?;

        let project = Project {
            name: project_name.to_string(),
            image_id: image_id.to_string(),
            image_tag: tag,
            built_at: Utc::now(),
            container_timeout_sec: config.and_then(|c| c.container_timeout),
            default_execution_args: config.and_then(|c| c.test_execution_arguments.clone()),
            baseline_tests,
        };
        self.repo.upsert_project(&project).await?;

        tracing::info!(
            project = project_name,
            tests = project.baseline_tests.len(),
            "project image ready"
        );

        Ok(BuildOutcome { project, execution })
    }

    /// Remove the project's image (with prune) and its record. History
    /// records are retained.
    pub async fn remove(&self, project_name: &str) -> Result<()> {
        let lock = self.project_lock(project_name).await;
        let _guard = lock.lock().await;

        let tag = Self::image_tag(project_name);
        match self.engine.remove_image(&tag, true).await {
            Ok(()) => {}
            Err(solgrade_engine::EngineError::ImageMissing(_)) => {
                tracing::debug!(project = project_name, "image already absent on removal");
            }
            Err(e) => return Err(e.into()),
        }

        if !self.repo.delete_project(project_name).await? {
            return Err(CoreError::NotFound(project_name.to_string()));
        }

        tracing::info!(project = project_name, "project removed");
        Ok(())
    }

    /// Look up the current image metadata for a project.
    pub async fn lookup(&self, project_name: &str) -> Result<Option<Project>> {
        self.repo.project(project_name).await
    }

    async fn remove_image_quietly(&self, tag: &str) {
        if let Err(e) = self.engine.remove_image(tag, true).await {
            tracing::debug!(tag, error = %e, "cleanup of partial image failed");
        }
    }
}

/// Overlay the repository's template files onto the extracted tree.
/// Caller-supplied files of the same path win, except the container build
/// file, which is always the template's.
fn overlay_template_files(project_root: &Path) -> std::io::Result<()> {
    std::fs::write(project_root.join("Dockerfile"), TEMPLATE_DOCKERFILE)?;

    let entrypoint = project_root.join("entrypoint.sh");
    if !entrypoint.exists() {
        std::fs::write(entrypoint, TEMPLATE_ENTRYPOINT)?;
    }
    Ok(())
}

/// Project names become image repositories, container names, and scratch
/// path components, so they are restricted accordingly.
fn validate_project_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(CoreError::BadInput(format!(
            "invalid project name {name:?}: use lowercase letters, digits, '-' and '_'"
        )))
    }
}
