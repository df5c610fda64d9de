use serde_json::{Map, Value};
use std::time::Duration;
use time::OffsetDateTime;

use crate::types::notification::{
    CLOSE_ACTION, EXPLORE_ACTION, NotificationAction, NotificationData, NotificationDescriptor,
    PushMessage,
};

const EXPLORE_LABEL: &str = "View Details";
const CLOSE_LABEL: &str = "Close";

/// Values used wherever a push payload does not supply its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibration_pattern: Vec<Duration>,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "Sensor Monitor".to_string(),
            body: "Sensor alert!".to_string(),
            icon: "/icon-192x192.png".to_string(),
            badge: "/icon-192x192.png".to_string(),
            vibration_pattern: [100, 50, 100].map(Duration::from_millis).to_vec(),
        }
    }
}

/// Outcome of reading an untrusted push payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Structured(PushFields),
    PlainText(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushFields {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub data: Map<String, Value>,
}

/// Only a JSON object counts as structured. Empty or non-string fields are
/// treated as absent and a non-object `data` is ignored.
pub fn classify(payload: &[u8]) -> DecodedPayload {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(mut object)) => {
            let data = match object.remove("data") {
                Some(Value::Object(data)) => data,
                _ => Map::new(),
            };
            DecodedPayload::Structured(PushFields {
                title: non_empty_string(object.get("title")),
                body: non_empty_string(object.get("body")),
                icon: non_empty_string(object.get("icon")),
                data,
            })
        }
        _ => DecodedPayload::PlainText(String::from_utf8_lossy(payload).into_owned()),
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// Builds the descriptor for a decode attempt. `arrival` is always stamped into
/// `data`, replacing any server-supplied value of the same key.
pub fn merge(
    decoded: Option<DecodedPayload>,
    defaults: &NotificationDefaults,
    arrival: OffsetDateTime,
) -> NotificationDescriptor {
    match decoded {
        Some(DecodedPayload::Structured(fields)) => NotificationDescriptor {
            title: fields.title.unwrap_or_else(|| defaults.title.clone()),
            body: fields.body.unwrap_or_else(|| defaults.body.clone()),
            icon: fields.icon.unwrap_or_else(|| defaults.icon.clone()),
            badge: Some(defaults.badge.clone()),
            vibration_pattern: defaults.vibration_pattern.clone(),
            data: NotificationData::new(arrival, fields.data),
            actions: vec![
                action(EXPLORE_ACTION, EXPLORE_LABEL, defaults),
                action(CLOSE_ACTION, CLOSE_LABEL, defaults),
            ],
        },
        Some(DecodedPayload::PlainText(text)) => {
            let mut descriptor = minimal(defaults, arrival);
            descriptor.body = text;
            descriptor
        }
        None => minimal(defaults, arrival),
    }
}

pub fn decode(
    message: &PushMessage,
    defaults: &NotificationDefaults,
    arrival: OffsetDateTime,
) -> NotificationDescriptor {
    merge(message.data.as_deref().map(classify), defaults, arrival)
}

fn minimal(defaults: &NotificationDefaults, arrival: OffsetDateTime) -> NotificationDescriptor {
    NotificationDescriptor {
        title: defaults.title.clone(),
        body: defaults.body.clone(),
        icon: defaults.icon.clone(),
        badge: None,
        vibration_pattern: Vec::new(),
        data: NotificationData::stamped(arrival),
        actions: Vec::new(),
    }
}

fn action(id: &str, label: &str, defaults: &NotificationDefaults) -> NotificationAction {
    NotificationAction {
        action: id.to_string(),
        title: label.to_string(),
        icon: defaults.icon.clone(),
    }
}
