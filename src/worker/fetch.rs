use crate::ports::{CacheStorage, Network};
use crate::types::http::{Request, Response};

#[derive(Debug, thiserror::Error)]
#[error("{method} {url} failed: {message}")]
pub struct FetchError {
    pub method: &'static str,
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intercepted {
    pub response: Response,
    pub source: ResponseSource,
}

/// Cache-first request handling: an exact match in the active bucket is served
/// as is, anything else goes to the network untouched. Cached entries are never
/// revalidated.
#[derive(Debug, Clone)]
pub struct FetchInterceptor<C, N> {
    storage: C,
    network: N,
    bucket: String,
}

impl<C, N> FetchInterceptor<C, N>
where
    C: CacheStorage,
    N: Network,
{
    pub fn new(storage: C, network: N, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            network,
            bucket: bucket.into(),
        }
    }

    pub async fn respond(&self, request: &Request) -> Result<Intercepted, FetchError> {
        match self.storage.lookup(&self.bucket, request).await {
            Ok(Some(response)) => {
                tracing::debug!(url = %request.url, "served from cache");
                return Ok(Intercepted {
                    response,
                    source: ResponseSource::Cache,
                });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(url = %request.url, "cache lookup failed, using network: {err}");
            }
        }

        let response = self
            .network
            .fetch(request)
            .await
            .map_err(|err| FetchError {
                method: request.method.as_str(),
                url: request.url.to_string(),
                message: err.to_string(),
            })?;
        Ok(Intercepted {
            response,
            source: ResponseSource::Network,
        })
    }
}
