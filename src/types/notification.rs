use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::time::Duration;
use time::OffsetDateTime;

pub const EXPLORE_ACTION: &str = "explore";
pub const CLOSE_ACTION: &str = "close";

/// Key under which the decode-time stamp is exposed in `data`.
pub const ARRIVAL_KEY: &str = "dateOfArrival";

/// Raw push delivery handed to the worker by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushMessage {
    pub data: Option<Vec<u8>>,
}

impl PushMessage {
    pub fn empty() -> Self {
        Self { data: None }
    }

    pub fn with_payload(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(payload.into()),
        }
    }
}

/// Normalized notification built once per push message, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDescriptor {
    pub title: String,
    pub body: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(
        rename = "vibrate",
        serialize_with = "serialize_millis",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub vibration_pattern: Vec<Duration>,
    pub data: NotificationData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationData {
    pub arrival: OffsetDateTime,
    fields: Map<String, Value>,
}

impl NotificationData {
    /// The arrival stamp always wins over a server-supplied field of the same name.
    pub fn new(arrival: OffsetDateTime, mut fields: Map<String, Value>) -> Self {
        fields.remove(ARRIVAL_KEY);
        Self { arrival, fields }
    }

    pub fn stamped(arrival: OffsetDateTime) -> Self {
        Self::new(arrival, Map::new())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn arrival_millis(&self) -> i64 {
        (self.arrival.unix_timestamp_nanos() / 1_000_000) as i64
    }
}

impl Serialize for NotificationData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(ARRIVAL_KEY, &self.arrival_millis())?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

fn serialize_millis<S: Serializer>(pattern: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(pattern.len()))?;
    for step in pattern {
        seq.serialize_element(&(step.as_millis() as u64))?;
    }
    seq.end()
}

/// Platform-assigned handle for a rendered notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationClick {
    pub notification: NotificationId,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    Explore,
    Close,
    /// Click on the notification body rather than on an action button.
    Body,
    Other,
}

impl NotificationClick {
    pub fn kind(&self) -> ClickAction {
        match self.action.as_deref() {
            None | Some("") => ClickAction::Body,
            Some(EXPLORE_ACTION) => ClickAction::Explore,
            Some(CLOSE_ACTION) => ClickAction::Close,
            Some(_) => ClickAction::Other,
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notification_data__should_override_server_arrival_key() {
        // Given
        let arrival = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let mut fields = Map::new();
        fields.insert(ARRIVAL_KEY.to_string(), json!("spoofed"));
        fields.insert("sensorId".to_string(), json!(4));

        // When
        let data = NotificationData::new(arrival, fields);
        let value = serde_json::to_value(&data).unwrap();

        // Then
        assert_eq!(value, json!({"sensorId": 4, "dateOfArrival": 1_700_000_000_000i64}));
    }

    #[test]
    fn descriptor__should_serialize_vibration_as_millis() {
        // Given
        let descriptor = NotificationDescriptor {
            title: "T".to_string(),
            body: "B".to_string(),
            icon: "/icon.png".to_string(),
            badge: None,
            vibration_pattern: vec![Duration::from_millis(100), Duration::from_millis(50)],
            data: NotificationData::stamped(OffsetDateTime::UNIX_EPOCH),
            actions: Vec::new(),
        };

        // When
        let value = serde_json::to_value(&descriptor).unwrap();

        // Then
        assert_eq!(value["vibrate"], json!([100, 50]));
        assert!(value.get("badge").is_none());
        assert!(value.get("actions").is_none());
    }

    #[test]
    fn click_kind__should_treat_empty_action_as_body_click() {
        let click = |action: Option<&str>| NotificationClick {
            notification: NotificationId("n-1".to_string()),
            action: action.map(str::to_string),
        };

        assert_eq!(click(None).kind(), ClickAction::Body);
        assert_eq!(click(Some("")).kind(), ClickAction::Body);
        assert_eq!(click(Some("explore")).kind(), ClickAction::Explore);
        assert_eq!(click(Some("close")).kind(), ClickAction::Close);
        assert_eq!(click(Some("snooze")).kind(), ClickAction::Other);
    }
}
