//! Queue names and envelope encoding
//!
//! Every logical operation `<op>` uses `<op>.request` plus per-publisher
//! reply queues `<op>.reply.<instance>`. Archive-carrying messages put a
//! small JSON header into the AMQP headers table and the raw archive bytes
//! into the body; control messages are a single JSON body.

use crate::{BusError, Result};
use lapin::protocol::basic::AMQPProperties;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use solgrade_core::{ErrorBody, ErrorKind};

pub const PROJECT_UPLOAD_OP: &str = "project-upload";
pub const SUBMISSION_EXECUTE_OP: &str = "submission-execute";
pub const PROJECT_REMOVAL_OP: &str = "project-removal";

/// Headers-table key carrying the JSON envelope header.
pub const HEADER_KEY: &str = "x-solgrade-header";

pub fn request_queue(op: &str) -> String {
    format!("{op}.request")
}

pub fn reply_queue(op: &str, instance: &str) -> String {
    format!("{op}.reply.{instance}")
}

/// Encode an envelope header into an AMQP headers table.
pub fn encode_header<T: Serialize>(header: &T) -> Result<FieldTable> {
    let json = serde_json::to_string(header)?;
    let mut table = FieldTable::default();
    table.insert(
        ShortString::from(HEADER_KEY),
        AMQPValue::LongString(LongString::from(json)),
    );
    Ok(table)
}

/// Decode an envelope header from message properties.
pub fn decode_header<T: DeserializeOwned>(properties: &AMQPProperties) -> Result<T> {
    let table = properties.headers().as_ref().ok_or(BusError::MissingHeader)?;
    let value = table
        .inner()
        .get(&ShortString::from(HEADER_KEY))
        .ok_or(BusError::MissingHeader)?;
    let AMQPValue::LongString(json) = value else {
        return Err(BusError::MissingHeader);
    };
    Ok(serde_json::from_slice(json.as_bytes())?)
}

/// Wire form of a failing reply, `{"status":"error","kind":...,"message":...}`.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorReply {
    pub status: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<ErrorBody> for ErrorReply {
    fn from(body: ErrorBody) -> Self {
        Self {
            status: "error".to_string(),
            kind: body.kind,
            message: body.message,
        }
    }
}

/// Encode a successful reply payload.
pub fn encode_ok<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(payload)?)
}

/// Encode a failing reply payload.
pub fn encode_err(body: &ErrorBody) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&ErrorReply::from(body.clone()))?)
}

/// Decode a reply, surfacing `{"status":"error"}` payloads as
/// [`BusError::Remote`].
pub fn decode_reply<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    if let Ok(error) = serde_json::from_slice::<ErrorReply>(payload) {
        if error.status == "error" {
            return Err(BusError::Remote(ErrorBody {
                kind: error.kind,
                message: error.message,
            }));
        }
    }
    Ok(serde_json::from_slice(payload)?)
}
