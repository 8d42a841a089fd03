//! Docker engine implementation using bollard

use crate::{
    context::create_build_context, EngineError, ImageBuildRequest, ImageId, Result, SandboxOutcome,
    SandboxRun, SandboxStatus, STOP_GRACE_SECONDS, SUBMISSION_MOUNT_PATH,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions, WaitContainerOptions,
};
use bollard::image::{BuildImageOptions, RemoveImageOptions};
use bollard::service::{HostConfig, Mount, MountTypeEnum};
use bollard::Docker;
use chrono::Utc;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Instant;

use crate::ContainerEngine;

/// Docker engine using the bollard crate.
pub struct DockerEngine {
    client: Docker,
}

impl DockerEngine {
    /// Connect to the daemon at `socket_path` and verify it responds.
    pub async fn connect(socket_path: &str) -> Result<Self> {
        let client = if socket_path.starts_with("http://") || socket_path.starts_with("https://") {
            Docker::connect_with_http(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| EngineError::Connection(e.to_string()))?
        } else {
            let path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| EngineError::Connection(e.to_string()))?
        };

        client
            .ping()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        Ok(Self { client })
    }

    /// Concatenate a container's captured output for one stream.
    async fn collect_logs(&self, id: &str, stdout: bool, stderr: bool) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout,
            stderr,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut stream = self.client.logs(id, Some(options));
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(output) => out.push_str(&String::from_utf8_lossy(&output.into_bytes())),
                Err(e) => return Err(classify(e)),
            }
        }
        Ok(out)
    }

    /// Best-effort container removal on cleanup paths.
    async fn remove_quietly(&self, id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.client.remove_container(id, Some(options)).await {
            tracing::warn!(container = id, error = %e, "failed to remove container");
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build_image(&self, req: &ImageBuildRequest) -> Result<ImageId> {
        let tar_data = create_build_context(&req.context_dir)?;

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: req.tag.clone(),
            labels: req.labels.clone(),
            ..Default::default()
        };

        let mut stream = self.client.build_image(options, None, Some(tar_data.into()));

        let mut image_id = None;
        while let Some(result) = stream.next().await {
            match result {
                Ok(output) => {
                    if let Some(error) = output.error {
                        return Err(EngineError::Build(error));
                    }
                    if let Some(aux) = output.aux {
                        if let Some(id) = aux.id {
                            image_id = Some(id);
                        }
                    }
                    if let Some(stream) = output.stream {
                        tracing::debug!("{}", stream.trim());
                    }
                }
                Err(e) => return Err(EngineError::Build(e.to_string())),
            }
        }

        image_id
            .map(ImageId::new)
            .ok_or_else(|| EngineError::Build("No image ID returned".to_string()))
    }

    async fn remove_image(&self, tag: &str, prune: bool) -> Result<()> {
        let options = RemoveImageOptions {
            force: true,
            noprune: !prune,
        };

        match self.client.remove_image(tag, Some(options), None).await {
            Ok(_) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(EngineError::ImageMissing(tag.to_string())),
            Err(e) => Err(classify(e)),
        }
    }

    async fn run_sandbox(&self, run: &SandboxRun) -> Result<SandboxOutcome> {
        let options = CreateContainerOptions {
            name: run.name.as_str(),
            platform: None,
        };

        let mounts = run.src_mount.as_ref().map(|dir| {
            vec![Mount {
                target: Some(SUBMISSION_MOUNT_PATH.to_string()),
                source: Some(dir.display().to_string()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(false),
                ..Default::default()
            }]
        });

        let host_config = HostConfig {
            mounts,
            ..Default::default()
        };

        let config = Config {
            image: Some(run.image.clone()),
            cmd: Some(run.cmd.clone()),
            labels: Some(HashMap::from([(
                "solgrade.managed".to_string(),
                "true".to_string(),
            )])),
            host_config: Some(host_config),
            ..Default::default()
        };

        let id = match self.client.create_container(Some(options), config).await {
            Ok(response) => response.id,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Err(EngineError::ImageMissing(run.image.clone())),
            Err(e) => return Err(classify(e)),
        };

        let started_at = Utc::now();
        let clock = Instant::now();

        if let Err(e) = self
            .client
            .start_container(&id, None::<StartContainerOptions<String>>)
            .await
        {
            self.remove_quietly(&id).await;
            return Err(classify(e));
        }

        let mut wait = self
            .client
            .wait_container(&id, None::<WaitContainerOptions<String>>);

        let (timed_out, exit_code) = match tokio::time::timeout(run.timeout, wait.next()).await {
            Ok(Some(Ok(response))) => (false, response.status_code),
            Ok(Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. }))) => {
                (false, code)
            }
            Ok(Some(Err(e))) => {
                self.remove_quietly(&id).await;
                return Err(classify(e));
            }
            Ok(None) => {
                self.remove_quietly(&id).await;
                return Err(EngineError::Runtime(
                    "wait stream ended without a response".to_string(),
                ));
            }
            Err(_) => {
                tracing::info!(container = %run.name, timeout = ?run.timeout, "stopping container on timeout");
                let options = StopContainerOptions {
                    t: STOP_GRACE_SECONDS as i64,
                };
                if let Err(e) = self.client.stop_container(&id, Some(options)).await {
                    tracing::warn!(container = %run.name, error = %e, "failed to stop timed-out container");
                }
                (true, -1)
            }
        };

        let stdout = self.collect_logs(&id, true, false).await.unwrap_or_default();
        let stderr = self.collect_logs(&id, false, true).await.unwrap_or_default();

        self.remove_quietly(&id).await;

        let status = if timed_out {
            SandboxStatus::Timeout
        } else {
            SandboxStatus::from_exit_code(exit_code)
        };

        Ok(SandboxOutcome {
            status,
            exit_code,
            elapsed: clock.elapsed(),
            started_at,
            finished_at: Utc::now(),
            stdout,
            stderr,
        })
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .ping()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        Ok(())
    }
}

/// Map a bollard error onto the engine taxonomy.
fn classify(e: bollard::errors::Error) -> EngineError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::ImageMissing(message),
        bollard::errors::Error::HyperResponseError { .. }
        | bollard::errors::Error::IOError { .. } => EngineError::Connection(e.to_string()),
        other => EngineError::Runtime(other.to_string()),
    }
}
