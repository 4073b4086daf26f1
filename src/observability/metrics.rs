//! Prometheus metrics for purge runs.
//!
//! Provides metrics for:
//! - Product and attachment deletions by outcome
//! - Batches processed
//! - Failed progress notifications

#[cfg(feature = "prometheus")]
use metrics::counter;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Start the Prometheus exporter if enabled.
///
/// The exporter serves `/metrics` on `config.listen` from a background task
/// of the current tokio runtime.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let addr = config
        .listen_addr()
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(MetricsError::Install)?;

    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!(
            "Metrics are enabled in config but the 'prometheus' feature is not compiled. \
            Rebuild with: cargo build --features prometheus"
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record one deletion attempt.
///
/// `kind` is "product" or "attachment", `outcome` is "success" or "failure".
pub fn record_purge_deletion(kind: &str, outcome: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "purge_deletions_total",
            "kind" => kind.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (kind, outcome);
    }
}

/// Record a processed (non-empty) batch.
pub fn record_purge_batch() {
    #[cfg(feature = "prometheus")]
    {
        counter!("purge_batches_total").increment(1);
    }
}

/// Record a progress notification that could not be delivered.
pub fn record_notification_failure(transport: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "purge_notification_failures_total",
            "transport" => transport.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = transport;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[cfg(feature = "prometheus")]
    #[error("Failed to install Prometheus exporter: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Metrics setup error: {0}")]
    Setup(String),
}
