use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::debug;
use worktrack_shared::api::NotificationEvent;

use super::{Notifier, NotifyError, Recipient, render};
use crate::server::config::EmailConfig;

/// Sends notifications over SMTP.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self, NotifyError> {
        let mut builder = if cfg.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
                .map_err(|e| NotifyError::Email(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.smtp_host)
        };
        if let Some(port) = cfg.smtp_port {
            builder = builder.port(port);
        }
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Email(e.to_string()))?;
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(
        &self,
        recipient: &Recipient,
        event: &NotificationEvent,
    ) -> Result<(), NotifyError> {
        let address: Address = recipient
            .email
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Email(e.to_string()))?;
        let (subject, body) = render(event);
        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(Some(recipient.name.clone()), address))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Email(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Email(e.to_string()))?;
        debug!(to = %recipient.email, kind = event.kind(), "notify: email sent");
        Ok(())
    }
}
