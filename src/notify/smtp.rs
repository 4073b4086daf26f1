//! SMTP transport built on `lettre`.

#![cfg(feature = "smtp")]

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::debug;

use super::{Notification, Notifier, NotifyError, NotifyResult};
use crate::config::{SmtpConfig, SmtpTls};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> NotifyResult<Self> {
        let builder = match config.tls {
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotifyError::Smtp(e.to_string()))?,
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotifyError::Smtp(e.to_string()))?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(&config.from)?,
        })
    }

    fn message(&self, notification: &Notification) -> NotifyResult<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&notification.to)?)
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> NotifyResult<Mailbox> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| {
            NotifyError::Address(format!("{}: {}", address, e))
        })
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> NotifyResult<()> {
        let message = self.message(notification)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        debug!(to = %notification.to, code = %response.code(), "Notification delivered");
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}
