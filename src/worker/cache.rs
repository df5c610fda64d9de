use futures::future::try_join_all;
use url::Url;

use crate::ports::{CacheStorage, Network};
use crate::types::http::{CacheEntry, Request};

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("invalid manifest entry '{entry}': {source}")]
    Manifest {
        entry: String,
        source: url::ParseError,
    },
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to populate cache '{bucket}': {message}")]
    Populate { bucket: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ActivateError {
    #[error("failed to list caches: {0}")]
    Keys(String),
    #[error("failed to delete cache '{bucket}': {message}")]
    Delete { bucket: String, message: String },
}

/// The fixed list of assets a worker version caches on install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    origin: Url,
    entries: Vec<String>,
}

impl AssetManifest {
    pub fn new(origin: Url, entries: Vec<String>) -> Self {
        Self { origin, entries }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn resolve(&self) -> Result<Vec<Url>, InstallError> {
        self.entries
            .iter()
            .map(|entry| {
                self.origin
                    .join(entry)
                    .map_err(|source| InstallError::Manifest {
                        entry: entry.clone(),
                        source,
                    })
            })
            .collect()
    }
}

/// Owns the bucket named after the current worker version.
#[derive(Debug, Clone)]
pub struct AssetCache<C, N> {
    storage: C,
    network: N,
    bucket: String,
    manifest: AssetManifest,
}

impl<C, N> AssetCache<C, N>
where
    C: CacheStorage,
    N: Network,
{
    pub fn new(storage: C, network: N, bucket: impl Into<String>, manifest: AssetManifest) -> Self {
        Self {
            storage,
            network,
            bucket: bucket.into(),
            manifest,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn storage(&self) -> &C {
        &self.storage
    }

    /// Fetches every manifest entry and stores them as one batch. Nothing is
    /// written unless every fetch succeeded with a 2xx status.
    pub async fn install(&self) -> Result<usize, InstallError> {
        let urls = self.manifest.resolve()?;
        let entries = try_join_all(urls.into_iter().map(|url| self.fetch_entry(url))).await?;
        let count = entries.len();
        self.storage
            .put_all(&self.bucket, entries)
            .await
            .map_err(|err| InstallError::Populate {
                bucket: self.bucket.clone(),
                message: err.to_string(),
            })?;
        tracing::info!(bucket = %self.bucket, entries = count, "opened cache");
        Ok(count)
    }

    async fn fetch_entry(&self, url: Url) -> Result<CacheEntry, InstallError> {
        let request = Request::get(url);
        let response =
            self.network
                .fetch(&request)
                .await
                .map_err(|err| InstallError::Fetch {
                    url: request.url.to_string(),
                    message: err.to_string(),
                })?;
        if !response.is_ok() {
            return Err(InstallError::Status {
                url: request.url.to_string(),
                status: response.status,
            });
        }
        Ok(CacheEntry { request, response })
    }

    /// Deletes every bucket other than the current one and returns the names
    /// that were removed.
    pub async fn activate(&self) -> Result<Vec<String>, ActivateError> {
        let names = self
            .storage
            .keys()
            .await
            .map_err(|err| ActivateError::Keys(err.to_string()))?;
        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| name != &self.bucket)
            .collect();

        try_join_all(stale.iter().map(|name| async move {
            tracing::info!(bucket = %name, "deleting old cache");
            self.storage
                .delete(name)
                .await
                .map_err(|err| ActivateError::Delete {
                    bucket: name.clone(),
                    message: err.to_string(),
                })
        }))
        .await?;
        Ok(stale)
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::MemoryCacheStorage;
    use crate::testing::TestNetwork;

    const ORIGIN: &str = "http://localhost:8080";

    fn manifest() -> AssetManifest {
        AssetManifest::new(
            Url::parse(ORIGIN).unwrap(),
            vec![
                "/".to_string(),
                "/static/js/bundle.js".to_string(),
                "/manifest.json".to_string(),
            ],
        )
    }

    fn serving_network() -> TestNetwork {
        TestNetwork::default()
            .with_body(&format!("{ORIGIN}/"), "<html>")
            .with_body(&format!("{ORIGIN}/static/js/bundle.js"), "bundle")
            .with_body(&format!("{ORIGIN}/manifest.json"), "{}")
    }

    #[tokio::test]
    async fn install_then_activate__should_leave_only_current_bucket_with_manifest() {
        // Given
        let storage = MemoryCacheStorage::new();
        storage
            .put_all("sensor-monitor-v0", Vec::new())
            .await
            .unwrap();
        storage.put_all("other-app", Vec::new()).await.unwrap();
        let cache = AssetCache::new(
            storage.clone(),
            serving_network(),
            "sensor-monitor-v1",
            manifest(),
        );

        // When
        let installed = cache.install().await.expect("install");
        let deleted = cache.activate().await.expect("activate");

        // Then
        assert_eq!(installed, 3);
        assert_eq!(deleted, vec!["other-app", "sensor-monitor-v0"]);
        assert_eq!(storage.keys().await.unwrap(), vec!["sensor-monitor-v1"]);
        let mut keys = storage.entry_keys("sensor-monitor-v1").expect("bucket");
        keys.sort();
        assert_eq!(
            keys,
            vec![
                format!("{ORIGIN}/"),
                format!("{ORIGIN}/manifest.json"),
                format!("{ORIGIN}/static/js/bundle.js"),
            ]
        );
    }

    #[tokio::test]
    async fn install__should_leave_no_bucket_when_any_fetch_fails() {
        // Given
        let storage = MemoryCacheStorage::new();
        let network = TestNetwork::default()
            .with_body(&format!("{ORIGIN}/"), "<html>")
            .with_body(&format!("{ORIGIN}/manifest.json"), "{}")
            .with_failure(&format!("{ORIGIN}/static/js/bundle.js"));
        let cache = AssetCache::new(storage.clone(), network, "sensor-monitor-v1", manifest());

        // When
        let result = cache.install().await;

        // Then
        assert!(matches!(result, Err(InstallError::Fetch { .. })));
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn install__should_fail_on_non_success_status() {
        // Given
        let storage = MemoryCacheStorage::new();
        let network = serving_network().with_status(&format!("{ORIGIN}/manifest.json"), 404);
        let cache = AssetCache::new(storage.clone(), network, "sensor-monitor-v1", manifest());

        // When
        let result = cache.install().await;

        // Then
        assert!(matches!(result, Err(InstallError::Status { status: 404, .. })));
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn activate__should_keep_current_bucket_when_nothing_is_stale() {
        // Given
        let storage = MemoryCacheStorage::new();
        let cache = AssetCache::new(
            storage.clone(),
            serving_network(),
            "sensor-monitor-v1",
            manifest(),
        );
        cache.install().await.expect("install");

        // When
        let deleted = cache.activate().await.expect("activate");

        // Then
        assert!(deleted.is_empty());
        assert_eq!(storage.keys().await.unwrap(), vec!["sensor-monitor-v1"]);
    }
}
