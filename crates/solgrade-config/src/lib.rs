//! Settings for solgrade services
//!
//! Configuration is environment-driven: both the runner and the front
//! service run inside containers, so every knob is an environment variable
//! with a development-friendly default.

mod error;
mod settings;

pub use error::*;
pub use settings::*;
