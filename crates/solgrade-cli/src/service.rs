//! Bus-facing runner service
//!
//! Maps the bus handler trait onto the image manager and submission
//! controller. Domain failures become `{kind, message}` error replies;
//! the transport layer never sees them as errors.

use async_trait::async_trait;
use solgrade_bus::{
    ProjectRemovalMessage, ProjectUploadHeader, ProjectUploadReply, RunnerHandler,
    SubmissionHeader, SubmissionReply,
};
use solgrade_core::{ErrorBody, ImageManager, SubmissionController, SubmissionRequest};
use std::sync::Arc;

pub struct RunnerService {
    images: Arc<ImageManager>,
    submissions: SubmissionController,
}

impl RunnerService {
    pub fn new(images: Arc<ImageManager>, submissions: SubmissionController) -> Self {
        Self {
            images,
            submissions,
        }
    }
}

#[async_trait]
impl RunnerHandler for RunnerService {
    async fn project_upload(
        &self,
        header: ProjectUploadHeader,
        archive: Vec<u8>,
    ) -> Result<ProjectUploadReply, ErrorBody> {
        self.images
            .build(&header.project_name, &archive, header.config.as_ref())
            .await
            .map(|outcome| ProjectUploadReply::from(&outcome))
            .map_err(|e| {
                tracing::warn!(project = %header.project_name, error = %e, "project upload failed");
                e.body()
            })
    }

    async fn submission_execute(
        &self,
        header: SubmissionHeader,
        archive: Vec<u8>,
    ) -> Result<SubmissionReply, ErrorBody> {
        let request = SubmissionRequest {
            project_name: header.project_name.clone(),
            archive,
            execution_args: header.execution_args,
        };

        self.submissions
            .execute(request)
            .await
            .map(SubmissionReply::from)
            .map_err(|e| {
                tracing::warn!(project = %header.project_name, error = %e, "submission failed");
                e.body()
            })
    }

    async fn project_removal(&self, message: ProjectRemovalMessage) {
        // One-way operation: failures are logged, never replied.
        if let Err(e) = self.images.remove(&message.project_name).await {
            tracing::warn!(project = %message.project_name, error = %e, "project removal failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solgrade_core::test_support::{
        submission_archive, template_archive, MemoryRepository, MockEngine,
    };
    use solgrade_core::ErrorKind;
    use solgrade_engine::SandboxStatus;
    use std::time::Duration;

    fn service(
        engine: Arc<MockEngine>,
        repo: Arc<MemoryRepository>,
        scratch: &std::path::Path,
    ) -> RunnerService {
        let timeout = Duration::from_secs(60);
        let images = Arc::new(ImageManager::new(
            engine.clone(),
            repo.clone(),
            scratch.to_path_buf(),
            timeout,
        ));
        let submissions =
            SubmissionController::new(engine, repo, scratch.to_path_buf(), timeout, 2);
        RunnerService::new(images, submissions)
    }

    #[tokio::test]
    async fn test_upload_then_submit_round_trip() {
        let engine = Arc::new(MockEngine::new());
        let repo = Arc::new(MemoryRepository::new());
        let scratch = tempfile::tempdir().unwrap();
        let service = service(engine.clone(), repo, scratch.path());

        engine.push_run(Ok(MockEngine::outcome(
            SandboxStatus::PurposelyStopped,
            137,
            "A:testFoo() (gas: 28334)\n",
        )));
        let reply = service
            .project_upload(
                ProjectUploadHeader {
                    project_name: "counter".to_string(),
                    config: None,
                },
                template_archive("counter"),
            )
            .await
            .unwrap();
        assert_eq!(reply.status, "ok");
        assert_eq!(reply.baseline_tests, vec!["A.testFoo"]);

        engine.push_run(Ok(MockEngine::outcome(
            SandboxStatus::Success,
            0,
            "Running 1 test for test/A.t.sol:A\n[PASS] testFoo() (gas: 28334)\nTest result: ok. 1 passed; 0 failed; finished in 1ms\n",
        )));
        let reply = service
            .submission_execute(
                SubmissionHeader {
                    project_name: "counter".to_string(),
                    correlation_id: None,
                    execution_args: None,
                },
                submission_archive(),
            )
            .await
            .unwrap();
        assert_eq!(reply.execution.output.overall.passed, Some(true));
    }

    #[tokio::test]
    async fn test_submission_against_unknown_project() {
        let engine = Arc::new(MockEngine::new());
        let repo = Arc::new(MemoryRepository::new());
        let scratch = tempfile::tempdir().unwrap();
        let service = service(engine, repo, scratch.path());

        let body = service
            .submission_execute(
                SubmissionHeader {
                    project_name: "ghost".to_string(),
                    correlation_id: None,
                    execution_args: None,
                },
                submission_archive(),
            )
            .await
            .unwrap_err();
        assert_eq!(body.kind, ErrorKind::ProjectNotFound);
    }

    #[tokio::test]
    async fn test_bad_template_maps_to_error_body() {
        let engine = Arc::new(MockEngine::new());
        let repo = Arc::new(MemoryRepository::new());
        let scratch = tempfile::tempdir().unwrap();
        let service = service(engine, repo, scratch.path());

        let body = service
            .project_upload(
                ProjectUploadHeader {
                    project_name: "counter".to_string(),
                    config: None,
                },
                vec![1, 2, 3],
            )
            .await
            .unwrap_err();
        assert_eq!(body.kind, ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn test_removal_is_quiet_on_unknown_project() {
        let engine = Arc::new(MockEngine::new());
        let repo = Arc::new(MemoryRepository::new());
        let scratch = tempfile::tempdir().unwrap();
        let service = service(engine, repo, scratch.path());

        // must not panic or error
        service
            .project_removal(ProjectRemovalMessage {
                project_name: "ghost".to_string(),
            })
            .await;
    }
}
