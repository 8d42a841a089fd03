//! Runner service wiring for the solgrade binary

mod commands;
mod service;

pub use commands::*;
pub use service::*;
