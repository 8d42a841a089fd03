//! Front-side request journal
//!
//! One `MessageRequest` row per bus round-trip: created PENDING when the
//! request is published, completed on reply receipt, on a remote error, or
//! on the publisher-side deadline.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use bson::doc;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

/// Error kind recorded when the publisher-side deadline expires. The
/// runner's work is not cancelled; its eventual reply is discarded.
pub const TIMEOUT_WAITING_FOR_RUNNER: &str = "TIMEOUT_WAITING_FOR_RUNNER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Completed,
}

/// One bus round-trip as seen by the front service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub submitter: String,
    pub status: RequestStatus,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_position_in_queue: Option<usize>,
    pub correlation_id: String,
    /// Domain document this request produced, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl MessageRequest {
    pub fn new(submitter: &str, correlation_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            submitter: submitter.to_string(),
            status: RequestStatus::Pending,
            is_error: false,
            starting_position_in_queue: None,
            correlation_id: correlation_id.to_string(),
            document_ref: None,
            response: None,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// Completion payload for a journal entry.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    Ok {
        response: Value,
        document_ref: Option<String>,
        starting_position_in_queue: Option<usize>,
    },
    Err {
        error: Value,
    },
}

/// Persistence seam for [`MessageRequest`] rows.
#[async_trait]
pub trait RequestJournal: Send + Sync {
    async fn record(&self, request: &MessageRequest) -> Result<()>;
    async fn complete(&self, correlation_id: &str, outcome: RequestOutcome) -> Result<()>;
}

/// MongoDB-backed journal (`message_requests` collection).
pub struct MongoJournal {
    collection: Collection<MessageRequest>,
}

impl MongoJournal {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("message_requests"),
        }
    }
}

#[async_trait]
impl RequestJournal for MongoJournal {
    async fn record(&self, request: &MessageRequest) -> Result<()> {
        self.collection.insert_one(request).await?;
        Ok(())
    }

    async fn complete(&self, correlation_id: &str, outcome: RequestOutcome) -> Result<()> {
        let update = match outcome {
            RequestOutcome::Ok {
                response,
                document_ref,
                starting_position_in_queue,
            } => {
                let mut set = doc! {
                    "status": "COMPLETED",
                    "isError": false,
                    "response": bson::to_bson(&response)?,
                };
                if let Some(document_ref) = document_ref {
                    set.insert("documentRef", document_ref);
                }
                if let Some(position) = starting_position_in_queue {
                    set.insert("startingPositionInQueue", position as i64);
                }
                set
            }
            RequestOutcome::Err { error } => doc! {
                "status": "COMPLETED",
                "isError": true,
                "error": bson::to_bson(&error)?,
            },
        };

        self.collection
            .update_one(doc! { "correlationId": correlation_id }, doc! { "$set": update })
            .await?;
        Ok(())
    }
}

/// In-memory journal, for tests and for front instances that do not
/// persist request rows.
#[derive(Default)]
pub struct MemoryJournal {
    pub requests: Mutex<Vec<MessageRequest>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, correlation_id: &str) -> Option<MessageRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.correlation_id == correlation_id)
            .cloned()
    }
}

#[async_trait]
impl RequestJournal for MemoryJournal {
    async fn record(&self, request: &MessageRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn complete(&self, correlation_id: &str, outcome: RequestOutcome) -> Result<()> {
        let mut requests = self.requests.lock().unwrap();
        if let Some(request) = requests
            .iter_mut()
            .find(|r| r.correlation_id == correlation_id)
        {
            request.status = RequestStatus::Completed;
            match outcome {
                RequestOutcome::Ok {
                    response,
                    document_ref,
                    starting_position_in_queue,
                } => {
                    request.is_error = false;
                    request.response = Some(response);
                    request.document_ref = document_ref;
                    request.starting_position_in_queue = starting_position_in_queue;
                }
                RequestOutcome::Err { error } => {
                    request.is_error = true;
                    request.error = Some(error);
                }
            }
        }
        Ok(())
    }
}
