//! Domain records persisted by the runner

use crate::TestReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solgrade_engine::SandboxStatus;
use std::collections::HashMap;

/// Upper bound on stderr carried inside an execution record.
pub const STDERR_CAP_BYTES: usize = 8 * 1024;

/// A registered project: one sandbox image plus its baseline test roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique human-readable name; doubles as the image repository.
    pub name: String,
    /// Image identifier assigned by the engine after the build.
    pub image_id: String,
    /// Image tag, `<name>:latest`.
    pub image_tag: String,
    pub built_at: DateTime<Utc>,
    /// Per-project container timeout; the service default applies when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_timeout_sec: Option<u64>,
    /// Execution arguments applied to every submission unless overridden.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_execution_args: Option<HashMap<String, Value>>,
    /// Test names discovered when the template was built. Immutable for
    /// the life of this image.
    pub baseline_tests: Vec<String>,
}

/// Optional per-project configuration uploaded alongside an archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_execution_arguments: Option<HashMap<String, Value>>,
}

/// Why a container was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPurpose {
    ProjectCreation,
    Submission,
}

/// Terminal status of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    PurposelyStopped,
    ApplicationError,
    Timeout,
    /// The runner itself failed mid-pipeline (recovered panic).
    Internal,
}

impl From<SandboxStatus> for ExecutionStatus {
    fn from(status: SandboxStatus) -> Self {
        match status {
            SandboxStatus::Success => Self::Success,
            SandboxStatus::PurposelyStopped => Self::PurposelyStopped,
            SandboxStatus::ApplicationError => Self::ApplicationError,
            SandboxStatus::Timeout => Self::Timeout,
        }
    }
}

/// One container invocation, sealed on exit. Append-only: records are
/// never mutated and survive removal of their project (audit trail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerExecution {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_name: String,
    pub purpose: ExecutionPurpose,
    pub status: ExecutionStatus,
    /// Raw engine exit code.
    pub exit_code: i64,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output: TestReport,
    /// Captured stderr, truncated to [`STDERR_CAP_BYTES`]. Set for
    /// TIMEOUT and APPLICATION_ERROR outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_args: Option<HashMap<String, Value>>,
}

impl ContainerExecution {
    pub fn new(project_name: &str, purpose: ExecutionPurpose) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_name: project_name.to_string(),
            purpose,
            status: ExecutionStatus::Internal,
            exit_code: -1,
            elapsed_ms: 0,
            started_at: now,
            finished_at: now,
            output: TestReport::default(),
            stderr: None,
            execution_args: None,
        }
    }
}

/// Truncate stderr for storage inside an execution record.
pub fn cap_stderr(stderr: &str) -> Option<String> {
    if stderr.is_empty() {
        return None;
    }
    let mut end = stderr.len().min(STDERR_CAP_BYTES);
    while !stderr.is_char_boundary(end) {
        end -= 1;
    }
    Some(stderr[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_wire_form() {
        assert_eq!(
            serde_json::to_value(ExecutionPurpose::ProjectCreation).unwrap(),
            "PROJECT_CREATION"
        );
        assert_eq!(
            serde_json::to_value(ExecutionPurpose::Submission).unwrap(),
            "SUBMISSION"
        );
    }

    #[test]
    fn test_status_wire_form() {
        assert_eq!(
            serde_json::to_value(ExecutionStatus::PurposelyStopped).unwrap(),
            "PURPOSELY_STOPPED"
        );
        assert_eq!(
            serde_json::to_value(ExecutionStatus::Internal).unwrap(),
            "INTERNAL"
        );
    }

    #[test]
    fn test_sandbox_status_conversion() {
        assert_eq!(
            ExecutionStatus::from(SandboxStatus::Timeout),
            ExecutionStatus::Timeout
        );
        assert_eq!(
            ExecutionStatus::from(SandboxStatus::Success),
            ExecutionStatus::Success
        );
    }

    #[test]
    fn test_project_config_parses_partial_json() {
        let config: ProjectConfig =
            serde_json::from_str(r#"{"containerTimeout": 30}"#).unwrap();
        assert_eq!(config.container_timeout, Some(30));
        assert!(config.test_execution_arguments.is_none());

        let config: ProjectConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_cap_stderr() {
        assert_eq!(cap_stderr(""), None);
        assert_eq!(cap_stderr("short"), Some("short".to_string()));

        let long = "x".repeat(STDERR_CAP_BYTES + 100);
        assert_eq!(cap_stderr(&long).unwrap().len(), STDERR_CAP_BYTES);
    }

    #[test]
    fn test_cap_stderr_respects_char_boundaries() {
        let mut long = "x".repeat(STDERR_CAP_BYTES - 1);
        long.push('é');
        long.push_str("tail");
        let capped = cap_stderr(&long).unwrap();
        assert!(capped.len() <= STDERR_CAP_BYTES);
        assert!(capped.ends_with('x'));
    }

    #[test]
    fn test_execution_round_trips_through_json() {
        let mut execution = ContainerExecution::new("counter", ExecutionPurpose::Submission);
        execution.status = ExecutionStatus::Success;
        execution.exit_code = 0;
        execution.elapsed_ms = 1234;

        let json = serde_json::to_string(&execution).unwrap();
        let back: ContainerExecution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, execution);
    }
}
