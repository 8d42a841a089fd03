//! Error taxonomy for solgrade-core
//!
//! Sandbox-level failures (failing tests, timeouts) are values inside
//! `ContainerExecution`, never errors. `CoreError` covers everything that
//! prevents an execution record from being produced at all.

use crate::ArchiveError;
use serde::{Deserialize, Serialize};
use solgrade_engine::EngineError;
use thiserror::Error;

/// Closed set of failure kinds exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BadInput,
    NotFound,
    ImageBuild,
    BaselineDiscovery,
    ProjectNotFound,
    ApplicationError,
    Timeout,
    DockerUnavailable,
    Internal,
}

impl ErrorKind {
    /// HTTP status the front service maps this kind to.
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadInput => 400,
            Self::NotFound | Self::ProjectNotFound => 404,
            Self::ImageBuild | Self::BaselineDiscovery => 422,
            Self::ApplicationError | Self::Timeout => 200,
            Self::DockerUnavailable => 503,
            Self::Internal => 500,
        }
    }
}

/// Wire form of a failing reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    BadInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown project: {0}")]
    ProjectNotFound(String),

    #[error("Image build failed: {0}")]
    ImageBuild(String),

    #[error("Baseline test discovery failed: {0}")]
    BaselineDiscovery(String),

    #[error("Container engine unavailable: {0}")]
    DockerUnavailable(String),

    #[error("Invalid archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadInput(_) | Self::Archive(_) => ErrorKind::BadInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ProjectNotFound(_) => ErrorKind::ProjectNotFound,
            Self::ImageBuild(_) => ErrorKind::ImageBuild,
            Self::BaselineDiscovery(_) => ErrorKind::BaselineDiscovery,
            Self::DockerUnavailable(_) => ErrorKind::DockerUnavailable,
            Self::Store(_) | Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<EngineError> for CoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Connection(msg) => Self::DockerUnavailable(msg),
            EngineError::ImageMissing(msg) => Self::ProjectNotFound(msg),
            EngineError::Build(msg) => Self::ImageBuild(msg),
            EngineError::Runtime(msg) => Self::Internal(msg),
            EngineError::Io(e) => Self::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_status_codes() {
        assert_eq!(ErrorKind::BadInput.status_code(), 400);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::ProjectNotFound.status_code(), 404);
        assert_eq!(ErrorKind::ImageBuild.status_code(), 422);
        assert_eq!(ErrorKind::BaselineDiscovery.status_code(), 422);
        assert_eq!(ErrorKind::ApplicationError.status_code(), 200);
        assert_eq!(ErrorKind::Timeout.status_code(), 200);
        assert_eq!(ErrorKind::DockerUnavailable.status_code(), 503);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }

    #[test]
    fn test_engine_errors_map_to_taxonomy() {
        let e: CoreError = EngineError::Connection("socket closed".into()).into();
        assert_eq!(e.kind(), ErrorKind::DockerUnavailable);

        let e: CoreError = EngineError::ImageMissing("ghost:latest".into()).into();
        assert_eq!(e.kind(), ErrorKind::ProjectNotFound);

        let e: CoreError = EngineError::Build("step 3 failed".into()).into();
        assert_eq!(e.kind(), ErrorKind::ImageBuild);
    }

    #[test]
    fn test_error_body_wire_form() {
        let body = CoreError::BadInput("missing src/".into()).body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "BAD_INPUT");
        assert!(json["message"].as_str().unwrap().contains("missing src/"));
    }
}
