use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushMessageBuilder,
};
use worktrack_shared::api::NotificationEvent;

use super::{Notifier, NotifyError, Recipient, render};
use crate::server::config::PushConfig;
use crate::storage::{Store, models::PushSubscription};

/// Sends Web Push messages to every subscription the recipient registered.
pub struct PushNotifier {
    inner: Arc<PushInner>,
}

struct PushInner {
    client: HyperWebPushClient,
    vapid_private: String,
    contact: Option<String>,
    store: Store,
}

#[derive(Serialize)]
struct PushPayload<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(flatten)]
    event: &'a NotificationEvent,
}

impl PushNotifier {
    pub fn from_config(cfg: &PushConfig, store: Store) -> Option<Self> {
        if !cfg.enabled {
            return None;
        }
        let vapid_private = cfg.vapid_private.clone()?;
        if cfg
            .vapid_public
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
            || vapid_private.trim().is_empty()
        {
            warn!("push: missing VAPID key(s); disabling push sink");
            return None;
        }
        Some(Self {
            inner: Arc::new(PushInner {
                client: HyperWebPushClient::new(),
                vapid_private,
                contact: cfg.contact_email.clone(),
                store,
            }),
        })
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn notify(
        &self,
        recipient: &Recipient,
        event: &NotificationEvent,
    ) -> Result<(), NotifyError> {
        let subs = self
            .inner
            .store
            .list_push_subscriptions_for_user(&recipient.user_id)
            .await?;
        if subs.is_empty() {
            return Ok(());
        }
        let (title, body) = render(event);
        let payload = Arc::new(serde_json::to_vec(&PushPayload {
            title: &title,
            body: &body,
            event,
        })?);
        for sub in subs {
            let inner = self.inner.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                if let Err(err) = inner.send_single(sub, payload).await {
                    warn!(error = %err, "push: send attempt failed");
                }
            });
        }
        Ok(())
    }
}

impl PushInner {
    async fn send_single(
        &self,
        subscription: PushSubscription,
        payload: Arc<Vec<u8>>,
    ) -> Result<(), NotifyError> {
        let endpoint = subscription.endpoint.clone();
        let push_err = |e: web_push::WebPushError| NotifyError::Push(e.to_string());

        let subscription_info = SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );

        let mut builder = WebPushMessageBuilder::new(&subscription_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload.as_ref());

        let mut vapid = VapidSignatureBuilder::from_base64(&self.vapid_private, &subscription_info)
            .map_err(push_err)?;
        if let Some(contact) = &self.contact {
            vapid.add_claim("sub", format!("mailto:{}", contact));
        }
        builder.set_vapid_signature(vapid.build().map_err(push_err)?);

        match self.client.send(builder.build().map_err(push_err)?).await {
            Ok(()) => {
                info!(endpoint = %endpoint, "push: delivered");
                if let Err(e) = self
                    .store
                    .mark_push_delivery_result(subscription.id, true, None)
                    .await
                {
                    warn!(endpoint = %endpoint, error = %e, "push: failed to mark success");
                }
                Ok(())
            }
            Err(err) => {
                let err_str = err.to_string();
                if let Err(e) = self
                    .store
                    .mark_push_delivery_result(subscription.id, false, Some(&err_str))
                    .await
                {
                    warn!(endpoint = %endpoint, error = %e, "push: failed to mark error");
                }

                if matches!(
                    err,
                    web_push::WebPushError::EndpointNotFound(_)
                        | web_push::WebPushError::EndpointNotValid(_)
                ) && let Err(e) = self
                    .store
                    .delete_push_subscription(&subscription.user_id, &endpoint)
                    .await
                {
                    warn!(
                        endpoint = %endpoint,
                        error = %e,
                        "push: failed to remove stale subscription"
                    );
                }

                Err(NotifyError::Push(err_str))
            }
        }
    }
}
