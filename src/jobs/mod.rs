//! Jobs: the product purge and its one-shot delayed trigger.
//!
//! Jobs follow a consistent pattern:
//! 1. Configuration in `config/purge.rs`
//! 2. A run function that performs a single pass
//! 3. Structured result types for tracking state
//! 4. Metrics for monitoring operations
//!
//! # Example
//!
//! ```toml
//! [purge]
//! owner_id = "7"
//! batch_size = 10
//!
//! [trigger]
//! delay_secs = 20
//! ```

mod product_purge;
mod trigger;

pub use product_purge::{
    BatchOutcome, ProductPurgeJob, PurgeError, PurgeRunResult, StopReason,
};
pub use trigger::{ArmOutcome, OneShotTrigger, TriggerState};
