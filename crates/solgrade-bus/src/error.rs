//! Error types for the bus adapter

use solgrade_core::ErrorBody;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Message is missing its envelope header")]
    MissingHeader,

    #[error("Timed out waiting for the runner")]
    ReplyTimeout,

    #[error("Reply channel closed before a reply arrived")]
    ChannelClosed,

    #[error("Runner replied with an error: {} ({:?})", .0.message, .0.kind)]
    Remote(ErrorBody),

    #[error("Store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("BSON error: {0}")]
    Bson(#[from] bson::ser::Error),
}

pub type Result<T> = std::result::Result<T, BusError>;
