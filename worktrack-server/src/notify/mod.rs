//! Best-effort notification delivery.
//!
//! Every configured [`Notifier`] receives each event in its own spawned task.
//! Failures are logged and never reach the caller that triggered the event.

mod email;
mod inbox;
mod log;
mod push;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use worktrack_shared::api::NotificationEvent;

pub use email::EmailNotifier;
pub use inbox::InboxNotifier;
pub use log::LogNotifier;
pub use push::PushNotifier;

use crate::server::config::NotificationsConfig;
use crate::storage::models::User;
use crate::storage::{StorageError, Store};

#[derive(Debug, Clone)]
pub struct Recipient {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for Recipient {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("email: {0}")]
    Email(String),
    #[error("push: {0}")]
    Push(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(
        &self,
        recipient: &Recipient,
        event: &NotificationEvent,
    ) -> Result<(), NotifyError>;
}

/// Fans events out to every configured sink.
#[derive(Clone, Default)]
pub struct Dispatcher {
    sinks: Arc<Vec<Arc<dyn Notifier>>>,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    pub fn from_config(cfg: &NotificationsConfig, store: &Store) -> Self {
        let mut sinks: Vec<Arc<dyn Notifier>> = Vec::new();
        if cfg.log {
            sinks.push(Arc::new(LogNotifier));
        }
        if cfg.inbox {
            sinks.push(Arc::new(InboxNotifier::new(store.clone())));
        }
        if let Some(email_cfg) = &cfg.email {
            match EmailNotifier::from_config(email_cfg) {
                Ok(n) => sinks.push(Arc::new(n)),
                Err(e) => warn!(error = %e, "notify: email sink disabled"),
            }
        }
        if let Some(push_cfg) = &cfg.push
            && let Some(n) = PushNotifier::from_config(push_cfg, store.clone())
        {
            sinks.push(Arc::new(n));
        }
        debug!(
            sinks = ?sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "notify: dispatcher configured"
        );
        Self::new(sinks)
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Delivers `event` to every recipient through every sink without
    /// waiting for completion.
    pub fn dispatch(&self, recipients: Vec<Recipient>, event: NotificationEvent) {
        if recipients.is_empty() || self.sinks.is_empty() {
            return;
        }
        let recipients = Arc::new(recipients);
        let event = Arc::new(event);
        for sink in self.sinks.iter().cloned() {
            let recipients = recipients.clone();
            let event = event.clone();
            tokio::spawn(async move {
                for r in recipients.iter() {
                    if let Err(e) = sink.notify(r, &event).await {
                        warn!(
                            sink = sink.name(),
                            user_id = %r.user_id,
                            kind = event.kind(),
                            task_id = event.task_id(),
                            error = %e,
                            "notify: delivery failed"
                        );
                    }
                }
            });
        }
    }
}

/// Subject line and plain-text body for an event.
pub fn render(event: &NotificationEvent) -> (String, String) {
    match event {
        NotificationEvent::TaskSubmitted {
            title,
            worker_name,
            report,
            reported_status,
            hours_spent,
            ..
        } => {
            let mut body = format!(
                "{} submitted a report for \"{}\" ({} h).\n\n{}",
                worker_name, title, hours_spent, report
            );
            if let Some(status) = reported_status {
                body.push_str(&format!("\n\nReported status: {}", status));
            }
            (format!("Report submitted: {}", title), body)
        }
        NotificationEvent::TaskApproved {
            title, feedback, ..
        } => (
            format!("Task approved: {}", title),
            format!("Your report for \"{}\" was approved.\n\n{}", title, feedback),
        ),
        NotificationEvent::TaskRejected {
            title, feedback, ..
        } => (
            format!("Task needs changes: {}", title),
            format!(
                "Your report for \"{}\" was rejected.\n\nFeedback: {}",
                title, feedback
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_message_carries_feedback() {
        let (subject, body) = render(&NotificationEvent::TaskRejected {
            task_id: 1,
            title: "Inventory".into(),
            feedback: "Missing totals".into(),
        });
        assert_eq!(subject, "Task needs changes: Inventory");
        assert!(body.contains("Missing totals"));
    }

    #[test]
    fn submission_message_names_worker() {
        let (_, body) = render(&NotificationEvent::TaskSubmitted {
            task_id: 1,
            title: "Inventory".into(),
            worker_id: "w".into(),
            worker_name: "Ada".into(),
            report: "Counted aisle 3".into(),
            reported_status: None,
            hours_spent: 2.0,
        });
        assert!(body.starts_with("Ada submitted"));
        assert!(!body.contains("Reported status"));
    }
}
