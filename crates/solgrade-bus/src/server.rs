//! Runner-side consumers
//!
//! One consumer per request queue. Project uploads run serialized
//! (prefetch 1): concurrent builds thrash the daemon's layer cache.
//! Submission deliveries use prefetch = the concurrency cap and are
//! handled in their own tasks; the real cap is the controller's semaphore.
//! Every consumer acks only after its reply has been published.

use crate::{
    decode_header, encode_err, encode_ok, request_queue, BusError, ProjectRemovalMessage,
    ProjectUploadHeader, ProjectUploadReply, Result, SubmissionHeader, SubmissionReply,
    PROJECT_REMOVAL_OP, PROJECT_UPLOAD_OP, SUBMISSION_EXECUTE_OP,
};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use solgrade_core::{ErrorBody, ErrorKind};
use std::sync::Arc;

/// The runner's domain operations, as seen from the bus.
#[async_trait]
pub trait RunnerHandler: Send + Sync + 'static {
    async fn project_upload(
        &self,
        header: ProjectUploadHeader,
        archive: Vec<u8>,
    ) -> std::result::Result<ProjectUploadReply, ErrorBody>;

    async fn submission_execute(
        &self,
        header: SubmissionHeader,
        archive: Vec<u8>,
    ) -> std::result::Result<SubmissionReply, ErrorBody>;

    async fn project_removal(&self, message: ProjectRemovalMessage);
}

/// Consumes the three request queues and publishes replies.
pub struct RunnerServer {
    connection: Connection,
    handler: Arc<dyn RunnerHandler>,
    submission_prefetch: u16,
}

impl RunnerServer {
    pub async fn connect(
        uri: &str,
        handler: Arc<dyn RunnerHandler>,
        submission_prefetch: u16,
    ) -> Result<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        Ok(Self {
            connection,
            handler,
            submission_prefetch,
        })
    }

    /// Serve until the connection drops.
    pub async fn serve(&self) -> Result<()> {
        let upload_channel = self.queue_channel(PROJECT_UPLOAD_OP, 1).await?;
        let submission_channel = self
            .queue_channel(SUBMISSION_EXECUTE_OP, self.submission_prefetch)
            .await?;
        let removal_channel = self.queue_channel(PROJECT_REMOVAL_OP, 1).await?;

        tracing::info!("runner consumers started");
        tokio::try_join!(
            upload_loop(upload_channel, self.handler.clone()),
            submission_loop(submission_channel, self.handler.clone()),
            removal_loop(removal_channel, self.handler.clone()),
        )?;
        Ok(())
    }

    async fn queue_channel(&self, op: &str, prefetch: u16) -> Result<Channel> {
        let channel = self.connection.create_channel().await?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;
        channel
            .queue_declare(
                &request_queue(op),
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(channel)
    }
}

async fn consume(channel: &Channel, op: &str) -> Result<lapin::Consumer> {
    Ok(channel
        .basic_consume(
            &request_queue(op),
            &format!("solgrade-runner-{op}"),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?)
}

async fn upload_loop(channel: Channel, handler: Arc<dyn RunnerHandler>) -> Result<()> {
    let mut consumer = consume(&channel, PROJECT_UPLOAD_OP).await?;

    while let Some(delivery) = consumer.next().await {
        let mut delivery = delivery?;
        let archive = std::mem::take(&mut delivery.data);
        let payload = match decode_header::<ProjectUploadHeader>(&delivery.properties) {
            Ok(header) => {
                tracing::info!(project = %header.project_name, "project upload received");
                match handler.project_upload(header, archive).await {
                    Ok(reply) => encode_ok(&reply)?,
                    Err(body) => encode_err(&body)?,
                }
            }
            Err(e) => encode_err(&bad_envelope(e))?,
        };

        publish_reply(&channel, &delivery, payload).await?;
        delivery.ack(BasicAckOptions::default()).await?;
    }
    Ok(())
}

async fn submission_loop(channel: Channel, handler: Arc<dyn RunnerHandler>) -> Result<()> {
    let mut consumer = consume(&channel, SUBMISSION_EXECUTE_OP).await?;

    while let Some(delivery) = consumer.next().await {
        let mut delivery = delivery?;
        let archive = std::mem::take(&mut delivery.data);
        let channel = channel.clone();
        let handler = handler.clone();

        // Prefetch bounds unacked deliveries; each one gets its own task
        // and acks when its reply is out.
        tokio::spawn(async move {
            let payload = match decode_header::<SubmissionHeader>(&delivery.properties) {
                Ok(header) => {
                    match handler.submission_execute(header, archive).await {
                        Ok(reply) => encode_ok(&reply),
                        Err(body) => encode_err(&body),
                    }
                }
                Err(e) => encode_err(&bad_envelope(e)),
            };

            let result = match payload {
                Ok(payload) => publish_reply(&channel, &delivery, payload).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to publish submission reply");
            }
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                tracing::error!(error = %e, "failed to ack submission request");
            }
        });
    }
    Ok(())
}

async fn removal_loop(channel: Channel, handler: Arc<dyn RunnerHandler>) -> Result<()> {
    let mut consumer = consume(&channel, PROJECT_REMOVAL_OP).await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        match serde_json::from_slice::<ProjectRemovalMessage>(&delivery.data) {
            Ok(message) => {
                tracing::info!(project = %message.project_name, "project removal received");
                handler.project_removal(message).await;
            }
            Err(e) => tracing::warn!(error = %e, "dropping malformed removal message"),
        }
        delivery.ack(BasicAckOptions::default()).await?;
    }
    Ok(())
}

async fn publish_reply(channel: &Channel, request: &Delivery, payload: Vec<u8>) -> Result<()> {
    let Some(reply_to) = request.properties.reply_to() else {
        tracing::warn!("request has no reply-to queue; dropping reply");
        return Ok(());
    };

    let mut properties = BasicProperties::default();
    if let Some(correlation_id) = request.properties.correlation_id() {
        properties = properties.with_correlation_id(correlation_id.clone());
    }

    channel
        .basic_publish(
            "",
            reply_to.as_str(),
            BasicPublishOptions::default(),
            &payload,
            properties,
        )
        .await?;
    Ok(())
}

fn bad_envelope(e: BusError) -> ErrorBody {
    ErrorBody {
        kind: ErrorKind::BadInput,
        message: format!("invalid message envelope: {e}"),
    }
}
