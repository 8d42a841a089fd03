//! Parsers for the sandbox tool's textual output
//!
//! All three are pure `&str -> TestReport` functions. Malformed lines are
//! skipped; unrecognized or empty input yields an empty report, never an
//! error.

mod forge;
mod gas_diff;
mod snapshot;

pub use forge::parse_forge_test;
pub use gas_diff::parse_gas_diff;
pub use snapshot::parse_gas_snapshot;
