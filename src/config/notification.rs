//! Progress notification configuration.
//!
//! # Example
//!
//! ```toml
//! [notification]
//! to = "ops@example.com"
//!
//! [notification.transport]
//! type = "smtp"
//! host = "smtp.example.com"
//! from = "purge@example.com"
//! username = "purge"
//! password = "${SMTP_PASSWORD}"
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Where progress notifications go and how they are delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// Recipient address.
    #[serde(default)]
    pub to: String,

    /// Subject line of progress emails.
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Delivery transport. Default: log only.
    #[serde(default)]
    pub transport: NotificationTransport,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            to: String::new(),
            subject: default_subject(),
            transport: NotificationTransport::default(),
        }
    }
}

fn default_subject() -> String {
    "Image Deletion and Product Deletion Progress".to_string()
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.transport {
            NotificationTransport::Log => Ok(()),
            NotificationTransport::Smtp(smtp) => {
                self.require_recipient()?;
                smtp.validate()
            }
            NotificationTransport::Http(http) => {
                self.require_recipient()?;
                http.validate()
            }
        }
    }

    fn require_recipient(&self) -> Result<(), ConfigError> {
        if self.to.trim().is_empty() {
            return Err(ConfigError::Validation(
                "notification.to is required when a mail transport is configured".into(),
            ));
        }
        Ok(())
    }
}

/// Notification delivery transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum NotificationTransport {
    /// Write notifications to the application log only.
    #[default]
    Log,

    /// Send email through an SMTP relay. Requires the `smtp` feature.
    Smtp(SmtpConfig),

    /// POST a JSON message to an HTTP mail API.
    Http(HttpMailConfig),
}

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// Relay hostname.
    pub host: String,

    /// Relay port. Default: 587
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Connection security. Default: starttls
    #[serde(default)]
    pub tls: SmtpTls,

    /// Sender address.
    pub from: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Timeout for a single send (seconds). Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SmtpConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Validation(
                "notification.transport.host cannot be empty".into(),
            ));
        }
        if self.from.is_empty() {
            return Err(ConfigError::Validation(
                "notification.transport.from cannot be empty".into(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::Validation(
                "notification.transport.username and password must be set together".into(),
            ));
        }
        Ok(())
    }
}

/// SMTP connection security.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTls {
    /// Upgrade a plaintext connection with STARTTLS.
    #[default]
    Starttls,
    /// Implicit TLS (usually port 465).
    Tls,
    /// No encryption. Only for local relays.
    None,
}

/// HTTP mail API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpMailConfig {
    /// Endpoint receiving `{"from", "to", "subject", "text"}`.
    pub url: String,

    /// Sender address.
    pub from: String,

    /// Bearer token sent in the `Authorization` header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout (seconds). Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpMailConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.url).map_err(|e| {
            ConfigError::Validation(format!("notification.transport.url is invalid: {}", e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(
                "notification.transport.url must use http or https".into(),
            ));
        }
        if self.from.is_empty() {
            return Err(ConfigError::Validation(
                "notification.transport.from cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_timeout_secs() -> u64 {
    30
}
