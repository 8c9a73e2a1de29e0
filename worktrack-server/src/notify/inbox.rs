use async_trait::async_trait;
use worktrack_shared::api::NotificationEvent;

use super::{Notifier, NotifyError, Recipient};
use crate::storage::Store;

/// Persists notifications so clients can poll for them.
pub struct InboxNotifier {
    store: Store,
}

impl InboxNotifier {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Notifier for InboxNotifier {
    fn name(&self) -> &'static str {
        "inbox"
    }

    async fn notify(
        &self,
        recipient: &Recipient,
        event: &NotificationEvent,
    ) -> Result<(), NotifyError> {
        self.store
            .insert_notification(&recipient.user_id, event.kind(), event)
            .await?;
        Ok(())
    }
}
