//! Test support utilities for solgrade-core
//!
//! Provides a configurable MockEngine and an in-memory Repository so the
//! image manager and submission controller can be exercised without a
//! Docker daemon or a MongoDB deployment.

use crate::{ContainerExecution, Project, Repository, Result};
use async_trait::async_trait;
use chrono::Utc;
use solgrade_engine::{
    ContainerEngine, EngineError, ImageBuildRequest, ImageId, SandboxOutcome, SandboxRun,
    SandboxStatus,
};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Records which methods were called on the mock engine.
#[derive(Debug, Clone)]
pub enum MockCall {
    BuildImage { tag: String },
    RemoveImage { tag: String, prune: bool },
    RunSandbox { name: String, image: String, cmd: Vec<String>, has_mount: bool },
    Ping,
}

/// Configurable mock container engine.
///
/// Scripted results are consumed front-to-back; when a queue is empty the
/// call falls back to a benign default (successful build, successful run
/// with empty output).
#[derive(Default)]
pub struct MockEngine {
    pub calls: Mutex<Vec<MockCall>>,
    pub build_results: Mutex<VecDeque<solgrade_engine::Result<ImageId>>>,
    pub run_results: Mutex<VecDeque<solgrade_engine::Result<SandboxOutcome>>>,
    pub remove_image_results: Mutex<VecDeque<solgrade_engine::Result<()>>>,
    /// Artificial duration of each sandbox run.
    pub run_delay: Mutex<Duration>,
    /// When set, `run_sandbox` panics (for isolation tests).
    pub panic_on_run: AtomicBool,
    /// Live / high-water sandbox counts, for concurrency-cap assertions.
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    /// Start/end instants of every sandbox run, in call order.
    pub run_spans: Mutex<Vec<(Instant, Instant)>>,
    /// Start/end instants of every image build, in call order.
    pub build_spans: Mutex<Vec<(Instant, Instant)>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_build(&self, result: solgrade_engine::Result<ImageId>) {
        self.build_results.lock().unwrap().push_back(result);
    }

    pub fn push_run(&self, result: solgrade_engine::Result<SandboxOutcome>) {
        self.run_results.lock().unwrap().push_back(result);
    }

    pub fn set_run_delay(&self, delay: Duration) {
        *self.run_delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    /// A sandbox outcome with the given classification and stdout.
    pub fn outcome(status: SandboxStatus, exit_code: i64, stdout: &str) -> SandboxOutcome {
        let now = Utc::now();
        SandboxOutcome {
            status,
            exit_code,
            elapsed: Duration::from_millis(10),
            started_at: now,
            finished_at: now,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// An outcome carrying stderr, for timeout / application-error paths.
    pub fn failed_outcome(status: SandboxStatus, exit_code: i64, stderr: &str) -> SandboxOutcome {
        let mut outcome = Self::outcome(status, exit_code, "");
        outcome.stderr = stderr.to_string();
        outcome
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn build_image(&self, req: &ImageBuildRequest) -> solgrade_engine::Result<ImageId> {
        self.calls.lock().unwrap().push(MockCall::BuildImage {
            tag: req.tag.clone(),
        });

        let start = Instant::now();
        let delay = *self.run_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.build_spans.lock().unwrap().push((start, Instant::now()));

        match self.build_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(ImageId::new("sha256:mock_image")),
        }
    }

    async fn remove_image(&self, tag: &str, prune: bool) -> solgrade_engine::Result<()> {
        self.calls.lock().unwrap().push(MockCall::RemoveImage {
            tag: tag.to_string(),
            prune,
        });
        match self.remove_image_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(()),
        }
    }

    async fn run_sandbox(&self, run: &SandboxRun) -> solgrade_engine::Result<SandboxOutcome> {
        self.calls.lock().unwrap().push(MockCall::RunSandbox {
            name: run.name.clone(),
            image: run.image.clone(),
            cmd: run.cmd.clone(),
            has_mount: run.src_mount.is_some(),
        });

        if self.panic_on_run.load(Ordering::SeqCst) {
            panic!("scripted sandbox panic");
        }

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);

        let start = Instant::now();
        let delay = *self.run_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.run_spans.lock().unwrap().push((start, Instant::now()));

        self.live.fetch_sub(1, Ordering::SeqCst);

        match self.run_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Self::outcome(SandboxStatus::Success, 0, "")),
        }
    }

    async fn ping(&self) -> solgrade_engine::Result<()> {
        self.calls.lock().unwrap().push(MockCall::Ping);
        Ok(())
    }
}

/// Convenience constructor for an engine error result.
pub fn engine_unreachable() -> EngineError {
    EngineError::Connection("mock engine unreachable".to_string())
}

/// In-memory repository for tests.
#[derive(Default)]
pub struct MemoryRepository {
    pub projects: Mutex<HashMap<String, Project>>,
    pub executions: Mutex<Vec<ContainerExecution>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions_for(&self, project: &str) -> Vec<ContainerExecution> {
        self.executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.project_name == project)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn upsert_project(&self, project: &Project) -> Result<()> {
        self.projects
            .lock()
            .unwrap()
            .insert(project.name.clone(), project.clone());
        Ok(())
    }

    async fn project(&self, name: &str) -> Result<Option<Project>> {
        Ok(self.projects.lock().unwrap().get(name).cloned())
    }

    async fn delete_project(&self, name: &str) -> Result<bool> {
        Ok(self.projects.lock().unwrap().remove(name).is_some())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.projects.lock().unwrap().values().cloned().collect())
    }

    async fn record_execution(&self, execution: &ContainerExecution) -> Result<()> {
        self.executions.lock().unwrap().push(execution.clone());
        Ok(())
    }

    async fn execution(&self, id: &str) -> Result<Option<ContainerExecution>> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Build a zip payload from `(name, content)` entries; names ending in
/// `/` become directories.
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }
    buf
}

/// A minimal valid template archive with one passing test contract.
pub fn template_archive(project: &str) -> Vec<u8> {
    zip_archive(&[
        (
            &format!("{project}/foundry.toml"),
            "[profile.default]\nsrc = \"src\"\ntest = \"test\"\n",
        ),
        (
            &format!("{project}/test/Counter.t.sol"),
            "contract CounterTest { function testIncrement() public {} }",
        ),
        (
            &format!("{project}/src/Counter.sol"),
            "contract Counter { uint256 public number; }",
        ),
    ])
}

/// A minimal valid submission archive.
pub fn submission_archive() -> Vec<u8> {
    zip_archive(&[(
        "src/Counter.sol",
        "contract Counter { uint256 public number; function increment() public { number++; } }",
    )])
}
