//! Delayed, batched bulk deletion of a merchant's products and their image
//! attachments, with progress notifications and an audit log.

pub mod audit;
pub mod config;
pub mod db;
pub mod jobs;
pub mod models;
pub mod notify;
pub mod observability;
pub mod storage;
