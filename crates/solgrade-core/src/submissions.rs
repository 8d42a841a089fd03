//! Submission scheduling and execution
//!
//! Submissions are admitted in arrival order and dispatched under a global
//! concurrency cap: a counting semaphore bounds live sandbox containers no
//! matter how many bus deliveries are in flight. Each submission runs in
//! its own task so a panic anywhere in the pipeline is recovered into an
//! INTERNAL record instead of taking a worker down.

use crate::{
    build_tool_args, cap_stderr, extract_archive, parse_forge_test, parse_gas_diff,
    parse_gas_snapshot, submission_dir_name, validate_submission_tree, ContainerExecution,
    CoreError, ExecutionPurpose, ExecutionStatus, Repository, Result, ScratchDir, TestReport,
    COMPARE_MODE,
};
use serde_json::Value;
use solgrade_engine::{ContainerEngine, SandboxRun, SandboxStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// One submission-execute request.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub project_name: String,
    pub archive: Vec<u8>,
    pub execution_args: Option<HashMap<String, Value>>,
}

/// A completed submission plus queue observability.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub execution: ContainerExecution,
    /// Queue depth at admission, stamped only when the queue was backed
    /// up past the soft threshold. Informational.
    pub starting_position_in_queue: Option<usize>,
}

struct ControllerInner {
    engine: Arc<dyn ContainerEngine>,
    repo: Arc<dyn Repository>,
    scratch_root: PathBuf,
    default_timeout: Duration,
    slots: Arc<Semaphore>,
    queued: AtomicUsize,
    queue_soft_threshold: usize,
}

/// Accepts, orders, and dispatches submissions under the concurrency cap.
#[derive(Clone)]
pub struct SubmissionController {
    inner: Arc<ControllerInner>,
}

impl SubmissionController {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        repo: Arc<dyn Repository>,
        scratch_root: PathBuf,
        default_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                engine,
                repo,
                scratch_root,
                default_timeout,
                slots: Arc::new(Semaphore::new(concurrency)),
                queued: AtomicUsize::new(0),
                queue_soft_threshold: concurrency * 2,
            }),
        }
    }

    /// Execute one submission to completion and seal its history record.
    ///
    /// Sandbox-level failures (failing tests, timeout, crash) come back as
    /// a record with the matching status; only infrastructure failures are
    /// errors.
    pub async fn execute(&self, request: SubmissionRequest) -> Result<SubmissionOutcome> {
        let inner = self.inner.clone();

        let depth = inner.queued.fetch_add(1, Ordering::SeqCst) + 1;
        let position = (depth > inner.queue_soft_threshold).then_some(depth);
        if position.is_some() {
            tracing::info!(
                project = %request.project_name,
                position = depth,
                "submission queue backed up"
            );
        }

        // Admission: the semaphore queues waiters in arrival order, so
        // this is the FIFO discipline as well as the cap.
        let permit = match inner.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                inner.queued.fetch_sub(1, Ordering::SeqCst);
                return Err(CoreError::Internal("submission pool shut down".to_string()));
            }
        };
        inner.queued.fetch_sub(1, Ordering::SeqCst);

        let project_name = request.project_name.clone();
        let task_inner = inner.clone();
        let handle = tokio::spawn(async move {
            // The slot is held for the whole extract-and-run tree and
            // returns to the pool before the bus message is acknowledged.
            let _permit = permit;
            run_pipeline(task_inner, request).await
        });

        let execution = match handle.await {
            Ok(result) => result?,
            Err(join_error) => {
                tracing::error!(
                    project = %project_name,
                    error = %join_error,
                    "submission task panicked"
                );
                let mut execution =
                    ContainerExecution::new(&project_name, ExecutionPurpose::Submission);
                execution.status = ExecutionStatus::Internal;
                inner.repo.record_execution(&execution).await?;
                execution
            }
        };

        Ok(SubmissionOutcome {
            execution,
            starting_position_in_queue: position,
        })
    }
}

async fn run_pipeline(
    inner: Arc<ControllerInner>,
    request: SubmissionRequest,
) -> Result<ContainerExecution> {
    let project = inner
        .repo
        .project(&request.project_name)
        .await?
        .ok_or_else(|| CoreError::ProjectNotFound(request.project_name.clone()))?;

    let scratch = ScratchDir::create(&inner.scratch_root, &submission_dir_name(&project.name))?;
    extract_archive(&request.archive, scratch.path())?;
    validate_submission_tree(scratch.path())?;

    // Project defaults first, request arguments override per key.
    let mut args = project.default_execution_args.clone().unwrap_or_default();
    if let Some(overrides) = &request.execution_args {
        args.extend(overrides.clone());
    }

    let mut cmd = vec![COMPARE_MODE.to_string()];
    cmd.extend(build_tool_args(&args));

    let timeout = project
        .container_timeout_sec
        .map(Duration::from_secs)
        .unwrap_or(inner.default_timeout);

    let run = SandboxRun {
        name: scratch.name().to_string(),
        image: project.image_tag.clone(),
        cmd,
        src_mount: Some(scratch.path().to_path_buf()),
        timeout,
    };

    let outcome = inner.engine.run_sandbox(&run).await?;

    let mut execution = ContainerExecution::new(&project.name, ExecutionPurpose::Submission);
    execution.status = outcome.status.into();
    execution.exit_code = outcome.exit_code;
    execution.elapsed_ms = outcome.elapsed.as_millis() as u64;
    execution.started_at = outcome.started_at;
    execution.finished_at = outcome.finished_at;
    execution.execution_args = (!args.is_empty()).then_some(args);

    match outcome.status {
        SandboxStatus::Success => {
            execution.output = TestReport::merge(
                parse_forge_test(&outcome.stdout),
                parse_gas_diff(&outcome.stdout),
            );
        }
        SandboxStatus::PurposelyStopped => {
            execution.output = parse_gas_snapshot(&outcome.stdout);
        }
        SandboxStatus::Timeout | SandboxStatus::ApplicationError => {
            execution.stderr = cap_stderr(&outcome.stderr);
        }
    }

    inner.repo.record_execution(&execution).await?;

    tracing::debug!(
        project = %project.name,
        status = ?execution.status,
        elapsed_ms = execution.elapsed_ms,
        "submission sealed"
    );

    Ok(execution)
}
