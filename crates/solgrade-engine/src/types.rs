//! Value types shared across engine implementations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Path inside the sandbox image where the submission tree is bind-mounted.
/// The image entrypoint overlays it onto the project workspace.
pub const SUBMISSION_MOUNT_PATH: &str = "/app/submission";

/// Exit code the template entrypoint uses to signal a clean snapshot-only
/// termination.
pub const PURPOSELY_STOPPED_EXIT_CODE: i64 = 137;

/// Grace period given to a container when it is stopped on timeout.
pub const STOP_GRACE_SECONDS: u32 = 5;

/// Image identifier assigned by the engine after a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageId(pub String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to build one sandbox image from a prepared context directory.
#[derive(Debug, Clone)]
pub struct ImageBuildRequest {
    /// Directory containing the overlaid project tree and its Dockerfile.
    pub context_dir: PathBuf,
    /// Tag for the resulting image, `<project>:latest`.
    pub tag: String,
    /// Labels attached to the image.
    pub labels: HashMap<String, String>,
}

/// A single sandbox container invocation.
#[derive(Debug, Clone)]
pub struct SandboxRun {
    /// Unique container name for this invocation.
    pub name: String,
    /// Image tag to run.
    pub image: String,
    /// Command passed to the image entrypoint.
    pub cmd: Vec<String>,
    /// Host directory bind-mounted at [`SUBMISSION_MOUNT_PATH`], when the
    /// run carries a submission tree.
    pub src_mount: Option<PathBuf>,
    /// Wall-clock limit; the container is stopped once it elapses.
    pub timeout: Duration,
}

/// Terminal classification of a sandbox run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxStatus {
    /// Raw exit code 0.
    Success,
    /// The entrypoint's snapshot-only path terminated cleanly.
    PurposelyStopped,
    /// Any other exit code.
    ApplicationError,
    /// The executor stopped the container after the timeout.
    Timeout,
}

impl SandboxStatus {
    /// Translate a raw engine exit code. Timeout is decided by the
    /// executor before the raw code is consulted.
    pub fn from_exit_code(code: i64) -> Self {
        match code {
            0 => Self::Success,
            PURPOSELY_STOPPED_EXIT_CODE => Self::PurposelyStopped,
            _ => Self::ApplicationError,
        }
    }
}

impl std::fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::PurposelyStopped => write!(f, "PURPOSELY_STOPPED"),
            Self::ApplicationError => write!(f, "APPLICATION_ERROR"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Captured result of a sandbox run.
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    pub status: SandboxStatus,
    /// Raw exit code reported by the engine (`-1` when stopped on timeout
    /// before the wait completed).
    pub exit_code: i64,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_translation() {
        assert_eq!(SandboxStatus::from_exit_code(0), SandboxStatus::Success);
        assert_eq!(
            SandboxStatus::from_exit_code(PURPOSELY_STOPPED_EXIT_CODE),
            SandboxStatus::PurposelyStopped
        );
        assert_eq!(
            SandboxStatus::from_exit_code(1),
            SandboxStatus::ApplicationError
        );
        assert_eq!(
            SandboxStatus::from_exit_code(255),
            SandboxStatus::ApplicationError
        );
    }

    #[test]
    fn test_status_display_matches_wire_form() {
        assert_eq!(SandboxStatus::Success.to_string(), "SUCCESS");
        assert_eq!(
            SandboxStatus::PurposelyStopped.to_string(),
            "PURPOSELY_STOPPED"
        );
        assert_eq!(
            SandboxStatus::ApplicationError.to_string(),
            "APPLICATION_ERROR"
        );
        assert_eq!(SandboxStatus::Timeout.to_string(), "TIMEOUT");
    }
}
