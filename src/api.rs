//! JSON client for the sensor REST API.
//!
//! Besides the dashboard reads it is the [`SubscriptionBackend`] the
//! subscription controller posts new push subscriptions to.

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ports::SubscriptionBackend;
use crate::types::push::PushSubscriptionRecord;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned {0}: {1}")]
    Status(StatusCode, String),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: i64,
    pub hwid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub id: i64,
    pub level: f64,
    /// Timestamp text exactly as the API reports it.
    pub readed_at: String,
    pub sensor: Sensor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Average {
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredSubscription {
    pub id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

#[derive(Serialize)]
struct NewThreshold<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    level: f64,
}

/// The readings endpoint answers with either one object or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(base: &Url) -> Result<Self, ApiError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(base, client))
    }

    pub fn with_client(base: &Url, client: Client) -> Self {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base, client }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn sensors(&self) -> Result<Vec<Sensor>, ApiError> {
        self.get("api/v1/sensor/all").await
    }

    pub async fn all_readings(&self) -> Result<Vec<SensorReading>, ApiError> {
        self.get("api/v1/sensorReading/all").await
    }

    pub async fn readings(&self, sensor_id: i64) -> Result<Vec<SensorReading>, ApiError> {
        let readings: OneOrMany<SensorReading> = self
            .get(&format!("api/v1/sensorReading/{sensor_id}"))
            .await?;
        Ok(readings.into())
    }

    pub async fn average(&self, sensor_id: i64, window_secs: u64) -> Result<Average, ApiError> {
        self.get(&format!(
            "api/v1/sensorReading/{sensor_id}/average/{window_secs}"
        ))
        .await
    }

    pub async fn thresholds(&self) -> Result<Vec<Threshold>, ApiError> {
        self.get("api/v1/threshold/all").await
    }

    /// Creates the threshold, or updates the existing one of the same type.
    pub async fn save_threshold(&self, kind: &str, level: f64) -> Result<Threshold, ApiError> {
        self.post("api/v1/threshold", &NewThreshold { kind, level })
            .await
    }

    pub async fn subscribe_push(
        &self,
        record: &PushSubscriptionRecord,
    ) -> Result<RegisteredSubscription, ApiError> {
        self.post("api/v1/push/subscribe", record).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.base.join(path)?;
        tracing::debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        Self::parse(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.base.join(path)?;
        tracing::debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(ApiError::Status(status, response.text().await?))
        }
    }
}

impl SubscriptionBackend for ApiClient {
    type Error = ApiError;
    type Fut<'a>
        = BoxFuture<'a, Result<(), Self::Error>>
    where
        Self: 'a;

    fn register_subscription<'a>(&'a self, record: &'a PushSubscriptionRecord) -> Self::Fut<'a> {
        Box::pin(async move {
            let registered = self.subscribe_push(record).await?;
            tracing::info!(id = registered.id, endpoint = %registered.endpoint, "registered push subscription");
            Ok(())
        })
    }
}
