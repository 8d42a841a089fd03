//! CLI command implementations

use crate::RunnerService;
use anyhow::Context;
use solgrade_bus::RunnerServer;
use solgrade_config::Settings;
use solgrade_core::{ImageManager, MongoRepository, Repository, SubmissionController};
use std::sync::Arc;
use std::time::Duration;

/// Run the runner service until the process is interrupted.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.scratch_root)
        .with_context(|| format!("creating scratch root {:?}", settings.scratch_root))?;

    let engine = Arc::new(
        solgrade_engine::connect(&settings.docker_socket_path)
            .await
            .context("connecting to the container engine")?,
    );
    let repo = Arc::new(
        MongoRepository::connect(&settings.mongodb_uri, &settings.mongodb_database)
            .await
            .context("connecting to the store")?,
    );

    let default_timeout = Duration::from_secs(settings.default_container_timeout_sec);
    let images = Arc::new(ImageManager::new(
        engine.clone(),
        repo.clone(),
        settings.scratch_root.clone(),
        default_timeout,
    ));
    let submissions = SubmissionController::new(
        engine,
        repo,
        settings.scratch_root.clone(),
        default_timeout,
        settings.submission_concurrency,
    );

    let handler = Arc::new(RunnerService::new(images, submissions));
    let server = RunnerServer::connect(
        &settings.amqp_uri(),
        handler,
        settings.submission_concurrency as u16,
    )
    .await
    .context("connecting to the message bus")?;

    tracing::info!(
        concurrency = settings.submission_concurrency,
        "runner started"
    );

    tokio::select! {
        result = server.serve() => result.context("bus consumer failed")?,
        _ = tokio::signal::ctrl_c() => {
            // Unacked requests return to the queue and are re-executed on
            // the next start; execution is idempotent per archive.
            tracing::info!("interrupt received, shutting down");
        }
    }

    Ok(())
}

/// Probe every dependency and report per-dependency health.
pub async fn check(settings: Settings) -> anyhow::Result<()> {
    let mut healthy = true;

    match solgrade_engine::connect(&settings.docker_socket_path).await {
        Ok(_) => println!("engine   ok  ({})", settings.docker_socket_path),
        Err(e) => {
            healthy = false;
            println!("engine   FAILED: {e}");
        }
    }

    match MongoRepository::connect(&settings.mongodb_uri, &settings.mongodb_database).await {
        Ok(repo) => match repo.ping().await {
            Ok(()) => println!("store    ok  ({})", settings.mongodb_database),
            Err(e) => {
                healthy = false;
                println!("store    FAILED: {e}");
            }
        },
        Err(e) => {
            healthy = false;
            println!("store    FAILED: {e}");
        }
    }

    match lapin::Connection::connect(
        &settings.amqp_uri(),
        lapin::ConnectionProperties::default(),
    )
    .await
    {
        Ok(_) => println!("bus      ok  ({})", settings.rabbitmq_host),
        Err(e) => {
            healthy = false;
            println!("bus      FAILED: {e}");
        }
    }

    if healthy {
        Ok(())
    } else {
        anyhow::bail!("one or more dependencies are unreachable")
    }
}
