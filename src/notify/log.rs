use async_trait::async_trait;
use tracing::info;

use super::{Notification, Notifier, NotifyResult};

/// Writes notifications to the application log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> NotifyResult<()> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            body = %notification.body,
            "Progress notification"
        );
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "log"
    }
}
