use serde::{Deserialize, Serialize};
use url::Url;

/// Subscription issued by the platform push service. Serializes to the body the
/// registration endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionRecord {
    pub endpoint: Url,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub user_visible_only: bool,
    pub application_server_key: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The user dismissed the prompt without choosing.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub service_worker: bool,
    pub push_manager: bool,
}

impl Capabilities {
    pub fn supported(self) -> bool {
        self.service_worker && self.push_manager
    }
}

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}
