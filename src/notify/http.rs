//! HTTP mail API transport.
//!
//! Sends `{"from", "to", "subject", "text"}` as a JSON POST, authenticated
//! with a bearer token when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{Notification, Notifier, NotifyError, NotifyResult};
use crate::config::HttpMailConfig;

pub struct HttpNotifier {
    client: Client,
    url: String,
    from: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpNotifier {
    pub fn new(config: &HttpMailConfig) -> NotifyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            from: config.from.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, notification: &Notification) -> NotifyResult<()> {
        let body = MailRequest {
            from: &self.from,
            to: &notification.to,
            subject: &notification.subject,
            text: &notification.body,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %self.url, to = %notification.to, "Notification delivered");
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}
