//! Route telemetry
//!
//! An in-memory, append-only log of route outcomes with aggregate
//! statistics. Every call to the router leaves exactly one record, whether
//! it succeeded or not.

mod log;
mod record;


pub use log::TelemetryLog;
pub use record::{CategoryStats, ProviderStats, RouteOutcome, RouteRecord, RouterStats};
