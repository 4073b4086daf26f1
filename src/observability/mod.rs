//! Observability: structured logging and Prometheus metrics.
//!
//! - Logging with configurable formats (pretty, compact, JSON)
//! - Prometheus counters for deletions, batches and notification failures

pub mod metrics;
mod tracing_init;

pub use tracing_init::*;
