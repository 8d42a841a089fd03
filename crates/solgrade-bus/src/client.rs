//! Typed front-service client
//!
//! `publish` returns a future keyed on a fresh correlation id; one reply
//! consumer per reply queue demultiplexes into the waiting futures. Every
//! round-trip is journaled as a `MessageRequest`.

use crate::{
    decode_reply, encode_header, reply_queue, request_queue, BusError, MessageRequest,
    MemoryJournal, ProjectRemovalMessage, ProjectUploadHeader, ProjectUploadReply, ReplyRouter,
    RequestJournal, RequestOutcome, Result, SubmissionHeader, SubmissionReply,
    PROJECT_REMOVAL_OP, PROJECT_UPLOAD_OP, SUBMISSION_EXECUTE_OP, TIMEOUT_WAITING_FOR_RUNNER,
};
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use serde_json::{json, Value};
use solgrade_core::ProjectConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Request/reply client used by the front service.
pub struct BusClient {
    channel: Channel,
    instance: String,
    router: Arc<ReplyRouter>,
    reply_deadline: Duration,
    journal: Arc<dyn RequestJournal>,
}

impl BusClient {
    /// Connect, declare the request queues, and start the reply consumers
    /// for this publisher instance.
    pub async fn connect(
        uri: &str,
        journal: Arc<dyn RequestJournal>,
        reply_deadline: Duration,
    ) -> Result<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        let instance = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

        for op in [PROJECT_UPLOAD_OP, SUBMISSION_EXECUTE_OP, PROJECT_REMOVAL_OP] {
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
        }

        let router = Arc::new(ReplyRouter::new());
        for op in [PROJECT_UPLOAD_OP, SUBMISSION_EXECUTE_OP] {
            let queue = reply_queue(op, &instance);
            channel
                .queue_declare(
                    &queue,
                    QueueDeclareOptions {
                        exclusive: true,
                        auto_delete: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;
            let consumer = channel
                .basic_consume(
                    &queue,
                    &format!("solgrade-front-{instance}-{op}"),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await?;
            tokio::spawn(consume_replies(consumer, router.clone()));
        }

        Ok(Self {
            channel,
            instance,
            router,
            reply_deadline,
            journal,
        })
    }

    /// A client that keeps its journal in memory (single-process setups,
    /// integration tests).
    pub async fn connect_unjournaled(uri: &str, reply_deadline: Duration) -> Result<Self> {
        Self::connect(uri, Arc::new(MemoryJournal::new()), reply_deadline).await
    }

    /// Upload a project template archive and await the build reply.
    pub async fn upload_project(
        &self,
        submitter: &str,
        project_name: &str,
        config: Option<ProjectConfig>,
        archive: &[u8],
    ) -> Result<ProjectUploadReply> {
        let header = ProjectUploadHeader {
            project_name: project_name.to_string(),
            config,
        };
        let correlation_id = uuid::Uuid::new_v4().to_string();

        let payload = self
            .request(
                PROJECT_UPLOAD_OP,
                encode_header(&header)?,
                archive,
                &correlation_id,
                submitter,
            )
            .await?;

        match decode_reply::<ProjectUploadReply>(&payload) {
            Ok(reply) => {
                self.journal
                    .complete(
                        &correlation_id,
                        RequestOutcome::Ok {
                            response: serde_json::to_value(&reply)?,
                            document_ref: None,
                            starting_position_in_queue: None,
                        },
                    )
                    .await?;
                Ok(reply)
            }
            Err(e) => self.complete_with_error(&correlation_id, e).await,
        }
    }

    /// Execute a submission archive and await its execution record.
    pub async fn execute_submission(
        &self,
        submitter: &str,
        project_name: &str,
        execution_args: Option<HashMap<String, Value>>,
        archive: &[u8],
    ) -> Result<SubmissionReply> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let header = SubmissionHeader {
            project_name: project_name.to_string(),
            correlation_id: Some(correlation_id.clone()),
            execution_args,
        };

        let payload = self
            .request(
                SUBMISSION_EXECUTE_OP,
                encode_header(&header)?,
                archive,
                &correlation_id,
                submitter,
            )
            .await?;

        match decode_reply::<SubmissionReply>(&payload) {
            Ok(reply) => {
                self.journal
                    .complete(
                        &correlation_id,
                        RequestOutcome::Ok {
                            response: serde_json::to_value(&reply)?,
                            document_ref: Some(reply.execution.id.clone()),
                            starting_position_in_queue: reply.starting_position_in_queue,
                        },
                    )
                    .await?;
                Ok(reply)
            }
            Err(e) => self.complete_with_error(&correlation_id, e).await,
        }
    }

    /// Fire-and-forget project removal. No reply is expected.
    pub async fn remove_project(&self, project_name: &str) -> Result<()> {
        let message = ProjectRemovalMessage {
            project_name: project_name.to_string(),
        };
        self.channel
            .basic_publish(
                "",
                &request_queue(PROJECT_REMOVAL_OP),
                BasicPublishOptions::default(),
                &serde_json::to_vec(&message)?,
                BasicProperties::default(),
            )
            .await?;
        Ok(())
    }

    async fn request(
        &self,
        op: &str,
        headers: FieldTable,
        body: &[u8],
        correlation_id: &str,
        submitter: &str,
    ) -> Result<Vec<u8>> {
        self.journal
            .record(&MessageRequest::new(submitter, correlation_id))
            .await?;

        let rx = self.router.register(correlation_id);

        let properties = BasicProperties::default()
            .with_correlation_id(correlation_id.to_string().into())
            .with_reply_to(reply_queue(op, &self.instance).into())
            .with_headers(headers);

        self.channel
            .basic_publish(
                "",
                &request_queue(op),
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await?;

        match tokio::time::timeout(self.reply_deadline, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => {
                self.fail_journal(correlation_id, "reply channel closed")
                    .await?;
                Err(BusError::ChannelClosed)
            }
            Err(_) => {
                // The runner keeps working; its eventual reply is dropped
                // by the router as an orphan.
                self.router.forget(correlation_id);
                self.fail_journal(correlation_id, "no reply within the deadline")
                    .await?;
                Err(BusError::ReplyTimeout)
            }
        }
    }

    async fn fail_journal(&self, correlation_id: &str, message: &str) -> Result<()> {
        self.journal
            .complete(
                correlation_id,
                RequestOutcome::Err {
                    error: json!({
                        "kind": TIMEOUT_WAITING_FOR_RUNNER,
                        "message": message,
                    }),
                },
            )
            .await
    }

    async fn complete_with_error<T>(&self, correlation_id: &str, error: BusError) -> Result<T> {
        if let BusError::Remote(body) = &error {
            self.journal
                .complete(
                    correlation_id,
                    RequestOutcome::Err {
                        error: serde_json::to_value(body)?,
                    },
                )
                .await?;
        }
        Err(error)
    }
}

async fn consume_replies(mut consumer: Consumer, router: Arc<ReplyRouter>) {
    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(mut delivery) => {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    tracing::warn!(error = %e, "failed to ack reply");
                }
                let payload = std::mem::take(&mut delivery.data);
                match delivery.properties.correlation_id() {
                    Some(id) => router.resolve(id.as_str(), payload),
                    None => tracing::warn!("dropping reply without a correlation id"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reply consumer error");
            }
        }
    }
    tracing::debug!("reply consumer stopped");
}
