//! Process-wide telemetry for the analytics pipeline.
//!
//! Counters and latency histograms live in a global registry and are
//! periodically written to the log by the ingestion supervisor. Component
//! health backs the `/health` endpoints.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
