use async_trait::async_trait;
use tracing::info;
use worktrack_shared::api::NotificationEvent;

use super::{Notifier, NotifyError, Recipient, render};

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(
        &self,
        recipient: &Recipient,
        event: &NotificationEvent,
    ) -> Result<(), NotifyError> {
        let (subject, body) = render(event);
        info!(
            to = %recipient.email,
            user_id = %recipient.user_id,
            kind = event.kind(),
            subject = %subject,
            body = %body,
            "notify: message"
        );
        Ok(())
    }
}
