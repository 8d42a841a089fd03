//! Message shapes carried over the bus

use serde::{Deserialize, Serialize};
use serde_json::Value;
use solgrade_core::{BuildOutcome, ContainerExecution, ProjectConfig, SubmissionOutcome};
use std::collections::HashMap;

/// Envelope header of a `project-upload.request`; body = archive bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUploadHeader {
    pub project_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ProjectConfig>,
}

/// Envelope header of a `submission-execute.request`; body = archive bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionHeader {
    pub project_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_args: Option<HashMap<String, Value>>,
}

/// One-way `project-removal.request` message (JSON body, no reply).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRemovalMessage {
    pub project_name: String,
}

/// Reply to a project upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUploadReply {
    pub status: String,
    pub image_id: String,
    pub baseline_tests: Vec<String>,
}

impl From<&BuildOutcome> for ProjectUploadReply {
    fn from(outcome: &BuildOutcome) -> Self {
        Self {
            status: "ok".to_string(),
            image_id: outcome.project.image_id.clone(),
            baseline_tests: outcome.project.baseline_tests.clone(),
        }
    }
}

/// Reply to a submission execution: the sealed execution record plus
/// queue observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReply {
    #[serde(flatten)]
    pub execution: ContainerExecution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_position_in_queue: Option<usize>,
}

impl From<SubmissionOutcome> for SubmissionReply {
    fn from(outcome: SubmissionOutcome) -> Self {
        Self {
            execution: outcome.execution,
            starting_position_in_queue: outcome.starting_position_in_queue,
        }
    }
}
