use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use time::OffsetDateTime;
use url::Url;

use crate::ports;
use crate::types::notification::{NotificationDescriptor, NotificationId};
use crate::types::push::{PushSubscriptionRecord, VapidConfig};

mod cache;
mod network;

pub use cache::{CacheStoreError, FsCacheStorage, MemoryCacheStorage};
pub use network::ReqwestNetwork;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl ports::TimeProvider for SystemTimeProvider {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("invalid app path: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to open browser: {0}")]
    Open(#[from] std::io::Error),
    #[error("browser task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Opens app paths in the desktop browser.
#[derive(Debug, Clone)]
pub struct BrowserWindowClients {
    origin: Url,
}

impl BrowserWindowClients {
    pub fn new(origin: Url) -> Self {
        Self { origin }
    }
}

impl ports::WindowClients for BrowserWindowClients {
    type Error = WindowError;
    type Fut<'a>
        = BoxFuture<'a, Result<(), Self::Error>>
    where
        Self: 'a;

    fn focus_or_open<'a>(&'a self, path: &'a str) -> Self::Fut<'a> {
        Box::pin(async move {
            let url = self.origin.join(path)?;
            tracing::info!(%url, "opening app window");
            tokio::task::spawn_blocking(move || open::that(url.as_str())).await??;
            Ok(())
        })
    }
}

/// Notification surface for hosts without a desktop notification service:
/// rendered notifications are written to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSurface {
    next_id: Arc<AtomicU64>,
}

impl ports::NotificationSurface for LogNotificationSurface {
    type Error = std::convert::Infallible;
    type Fut<'a>
        = std::future::Ready<Result<NotificationId, Self::Error>>
    where
        Self: 'a;

    fn show<'a>(&'a self, descriptor: &'a NotificationDescriptor) -> Self::Fut<'a> {
        let id = NotificationId(format!(
            "notification-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        ));
        tracing::info!(
            %id,
            title = %descriptor.title,
            body = %descriptor.body,
            actions = descriptor.actions.len(),
            "notification shown"
        );
        std::future::ready(Ok(id))
    }

    fn dismiss(&self, id: &NotificationId) {
        tracing::info!(%id, "notification dismissed");
    }
}

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            client: Arc::new(client),
        })
    }
}

impl ports::PushSender for WebPushSender {
    type Error = web_push::WebPushError;
    type Fut<'a>
        = BoxFuture<'a, Result<(), Self::Error>>
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        subscription: &'a PushSubscriptionRecord,
        payload: &'a [u8],
    ) -> Self::Fut<'a> {
        Box::pin(async move {
            let subscription_info = web_push::SubscriptionInfo::new(
                subscription.endpoint.to_string(),
                subscription.p256dh.clone(),
                subscription.auth.clone(),
            );
            let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
            builder.set_payload(web_push::ContentEncoding::Aes128Gcm, payload);
            let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
                &self.vapid.private_key,
                web_push::URL_SAFE_NO_PAD,
                &subscription_info,
            )?;
            signature_builder.add_claim("sub", self.vapid.subject.as_str());
            builder.set_vapid_signature(signature_builder.build()?);
            self.client.send(builder.build()?).await?;
            tracing::debug!(endpoint = %subscription.endpoint, bytes = payload.len(), "push delivered");
            Ok(())
        })
    }
}
