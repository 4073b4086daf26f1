//! Progress notifications.
//!
//! The purge job reports progress through the [`Notifier`] trait. Three
//! transports are available, selected by `[notification.transport]`:
//!
//! - **log**: write the message to the application log (default)
//! - **smtp**: send an email through an SMTP relay (`smtp` feature)
//! - **http**: POST the message to an HTTP mail API

mod http;
mod log;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
pub use http::HttpNotifier;
pub use log::LogNotifier;
#[cfg(feature = "smtp")]
pub use smtp::SmtpNotifier;
use thiserror::Error;

use crate::config::{NotificationConfig, NotificationTransport};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Transport '{0}' is not compiled in")]
    NotCompiled(&'static str),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// A single message to an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Progress message sent after `batches` batches.
    pub fn progress(config: &NotificationConfig, batches: u64) -> Self {
        Self {
            to: config.to.clone(),
            subject: config.subject.clone(),
            body: format!("Processed {} batches so far.", batches),
        }
    }
}

/// Delivers notifications. Implementations make a single attempt per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> NotifyResult<()>;

    /// Transport name for logs and metrics.
    fn transport_name(&self) -> &'static str;
}

/// Build the notifier described by `config`.
pub fn build_notifier(config: &NotificationConfig) -> NotifyResult<Arc<dyn Notifier>> {
    match &config.transport {
        NotificationTransport::Log => Ok(Arc::new(LogNotifier)),
        NotificationTransport::Http(http) => Ok(Arc::new(HttpNotifier::new(http)?)),
        #[cfg(feature = "smtp")]
        NotificationTransport::Smtp(smtp) => Ok(Arc::new(SmtpNotifier::new(smtp)?)),
        #[cfg(not(feature = "smtp"))]
        NotificationTransport::Smtp(_) => Err(NotifyError::NotCompiled("smtp")),
    }
}
