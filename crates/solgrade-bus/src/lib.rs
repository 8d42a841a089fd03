//! AMQP request/reply adapter for solgrade
//!
//! This crate provides:
//! - Queue names and envelope encoding (JSON header + archive body)
//! - The front-service client: publish with a fresh correlation id, await
//!   the matching reply under a deadline, journal every round-trip
//! - The runner server: consume the request queues under the configured
//!   prefetch and publish replies, acking after the reply is out

mod client;
mod error;
mod journal;
mod messages;
mod protocol;
mod router;
mod server;

pub use client::*;
pub use error::*;
pub use journal::*;
pub use messages::*;
pub use protocol::*;
pub use router::*;
pub use server::*;
