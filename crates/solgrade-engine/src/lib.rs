//! Container engine trait and Docker implementation for solgrade
//!
//! This crate is the single seam between the runner and the host container
//! engine: image builds from prepared context directories, one-shot sandbox
//! runs with a timeout, and image removal.

mod context;
mod docker;
mod error;
mod types;

pub use context::create_build_context;
pub use docker::DockerEngine;
pub use error::*;
pub use types::*;

use async_trait::async_trait;

/// Trait for container engines (Docker, or a test double).
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Build an image from a prepared context directory.
    async fn build_image(&self, req: &ImageBuildRequest) -> Result<ImageId>;

    /// Remove an image; with `prune`, dangling parent layers go too.
    async fn remove_image(&self, tag: &str, prune: bool) -> Result<()>;

    /// Run one sandbox container to completion (or timeout) and capture
    /// its output. The container is always removed afterwards.
    async fn run_sandbox(&self, run: &SandboxRun) -> Result<SandboxOutcome>;

    /// Check that the engine is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Connect to the Docker daemon at the configured socket.
pub async fn connect(socket_path: &str) -> Result<DockerEngine> {
    DockerEngine::connect(socket_path).await
}
