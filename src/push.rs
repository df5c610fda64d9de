use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapters::WebPushSender;
use crate::config;
use crate::ports::push::PushSender;
use crate::types::push::PushSubscriptionRecord;

pub(crate) mod vapid;

pub use vapid::{
    VapidConfigStatus, VapidCredentials, VapidError, generate_vapid_credentials,
    load_vapid_config,
};

/// Body a backend sends through the push service. The worker decoder reads
/// the same shape back out of the delivered message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl PushPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            data: Map::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("push delivery disabled: VAPID configuration is missing")]
    VapidMissing,
    #[error("push delivery disabled: incomplete VAPID configuration")]
    VapidIncomplete,
    #[error("push delivery disabled: {0}")]
    VapidInvalid(VapidError),
    #[error("failed to init web-push: {0}")]
    Client(web_push::WebPushError),
    #[error("failed to encode push payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("push delivery failed: {0}")]
    Deliver(String),
}

pub async fn send_test_notification<S: PushSender>(
    sender: &S,
    subscription: &PushSubscriptionRecord,
    payload: &PushPayload,
) -> Result<(), SendError> {
    let body = serde_json::to_vec(payload)?;
    sender
        .send(subscription, &body)
        .await
        .map_err(|err| SendError::Deliver(err.to_string()))?;
    tracing::info!(endpoint = %subscription.endpoint, title = %payload.title, "sent push notification");
    Ok(())
}

/// Delivers through web-push using the VAPID keys in `config`.
pub async fn send_configured(
    config: &config::AppConfig,
    subscription: &PushSubscriptionRecord,
    payload: &PushPayload,
) -> Result<(), SendError> {
    let vapid = match load_vapid_config(config) {
        VapidConfigStatus::Ready(vapid) => vapid,
        VapidConfigStatus::Incomplete => return Err(SendError::VapidIncomplete),
        VapidConfigStatus::Invalid(err) => return Err(SendError::VapidInvalid(err)),
        VapidConfigStatus::Missing => return Err(SendError::VapidMissing),
    };
    let sender = WebPushSender::new(vapid).map_err(SendError::Client)?;
    send_test_notification(&sender, subscription, payload).await
}
