use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::ports;
use crate::types::http::{CacheEntry, Request, Response};

const INDEX_FILE: &str = "entries.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    #[error("invalid cache name '{0}'")]
    InvalidName(String),
    #[error("request {method} {url} cannot be cached")]
    Uncacheable { method: &'static str, url: String },
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt cache index: {0}")]
    Index(#[from] serde_json::Error),
}

type Bucket = BTreeMap<String, Response>;

fn keyed_entries(entries: Vec<CacheEntry>) -> Result<Vec<(String, Response)>, CacheStoreError> {
    entries
        .into_iter()
        .map(|entry| match entry.request.cache_key() {
            Some(key) => Ok((key, entry.response)),
            None => Err(CacheStoreError::Uncacheable {
                method: entry.request.method.as_str(),
                url: entry.request.url.to_string(),
            }),
        })
        .collect()
}

/// Cache storage kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    buckets: Arc<Mutex<BTreeMap<String, Bucket>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn entry_keys(&self, bucket: &str) -> Option<Vec<String>> {
        let buckets = self.lock();
        buckets.get(bucket).map(|entries| entries.keys().cloned().collect())
    }
}

impl ports::CacheStorage for MemoryCacheStorage {
    type Error = CacheStoreError;
    type PutFut<'a>
        = std::future::Ready<Result<(), Self::Error>>
    where
        Self: 'a;
    type KeysFut<'a>
        = std::future::Ready<Result<Vec<String>, Self::Error>>
    where
        Self: 'a;
    type DeleteFut<'a>
        = std::future::Ready<Result<bool, Self::Error>>
    where
        Self: 'a;
    type LookupFut<'a>
        = std::future::Ready<Result<Option<Response>, Self::Error>>
    where
        Self: 'a;

    fn put_all<'a>(&'a self, bucket: &'a str, entries: Vec<CacheEntry>) -> Self::PutFut<'a> {
        let result = keyed_entries(entries).map(|entries| {
            let mut buckets = self.lock();
            buckets.entry(bucket.to_string()).or_default().extend(entries);
        });
        std::future::ready(result)
    }

    fn keys<'a>(&'a self) -> Self::KeysFut<'a> {
        let buckets = self.lock();
        std::future::ready(Ok(buckets.keys().cloned().collect()))
    }

    fn delete<'a>(&'a self, bucket: &'a str) -> Self::DeleteFut<'a> {
        let mut buckets = self.lock();
        std::future::ready(Ok(buckets.remove(bucket).is_some()))
    }

    fn lookup<'a>(&'a self, bucket: &'a str, request: &'a Request) -> Self::LookupFut<'a> {
        let buckets = self.lock();
        let found = request.cache_key().and_then(|key| {
            buckets
                .get(bucket)
                .and_then(|entries| entries.get(&key).cloned())
        });
        std::future::ready(Ok(found))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    key: String,
    status: u16,
    headers: Vec<(String, String)>,
    body_file: String,
}

/// Cache storage on disk: one directory per bucket holding an `entries.json`
/// index and one body file per entry. Buckets are written to a hidden staging
/// directory first and renamed into place, so readers never see a half-written
/// bucket.
#[derive(Debug, Clone)]
pub struct FsCacheStorage {
    root: PathBuf,
}

impl FsCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, CacheStoreError> {
        if !is_valid_bucket_name(bucket) {
            return Err(CacheStoreError::InvalidName(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    async fn put_all_inner(
        &self,
        bucket: &str,
        entries: Vec<CacheEntry>,
    ) -> Result<(), CacheStoreError> {
        let target = self.bucket_dir(bucket)?;
        let entries = keyed_entries(entries)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let mut merged = read_bucket(&target).await?.unwrap_or_default();
        merged.extend(entries);

        let staging = self.root.join(format!(".staging-{bucket}-{}", random_suffix()));
        if let Err(err) = write_bucket(&staging, &merged).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(err);
        }

        self.swap_into_place(bucket, &staging, &target).await
    }

    /// Replaces `target` with `staging`. On failure the previous bucket is put
    /// back and the staging directory removed.
    async fn swap_into_place(
        &self,
        bucket: &str,
        staging: &Path,
        target: &Path,
    ) -> Result<(), CacheStoreError> {
        let retired = self.root.join(format!(".retired-{bucket}-{}", random_suffix()));
        let had_previous = match tokio::fs::rename(target, &retired).await {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => {
                let _ = tokio::fs::remove_dir_all(staging).await;
                return Err(err.into());
            }
        };
        if let Err(err) = tokio::fs::rename(staging, target).await {
            if had_previous && let Err(restore_err) = tokio::fs::rename(&retired, target).await {
                tracing::error!(
                    path = %retired.display(),
                    "failed to restore previous cache: {restore_err}"
                );
            }
            let _ = tokio::fs::remove_dir_all(staging).await;
            return Err(err.into());
        }
        if had_previous && let Err(err) = tokio::fs::remove_dir_all(&retired).await {
            tracing::warn!(path = %retired.display(), "failed to remove retired cache: {err}");
        }
        Ok(())
    }

    async fn keys_inner(&self) -> Result<Vec<String>, CacheStoreError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_valid_bucket_name(name)
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_inner(&self, bucket: &str) -> Result<bool, CacheStoreError> {
        let target = self.bucket_dir(bucket)?;
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn lookup_inner(
        &self,
        bucket: &str,
        request: &Request,
    ) -> Result<Option<Response>, CacheStoreError> {
        let Some(key) = request.cache_key() else {
            return Ok(None);
        };
        let target = self.bucket_dir(bucket)?;
        let Some(index) = read_index(&target).await? else {
            return Ok(None);
        };
        let Some(entry) = index.into_iter().find(|entry| entry.key == key) else {
            return Ok(None);
        };
        let body = tokio::fs::read(target.join(&entry.body_file)).await?;
        Ok(Some(Response {
            status: entry.status,
            headers: entry.headers,
            body,
        }))
    }
}

impl ports::CacheStorage for FsCacheStorage {
    type Error = CacheStoreError;
    type PutFut<'a>
        = BoxFuture<'a, Result<(), Self::Error>>
    where
        Self: 'a;
    type KeysFut<'a>
        = BoxFuture<'a, Result<Vec<String>, Self::Error>>
    where
        Self: 'a;
    type DeleteFut<'a>
        = BoxFuture<'a, Result<bool, Self::Error>>
    where
        Self: 'a;
    type LookupFut<'a>
        = BoxFuture<'a, Result<Option<Response>, Self::Error>>
    where
        Self: 'a;

    fn put_all<'a>(&'a self, bucket: &'a str, entries: Vec<CacheEntry>) -> Self::PutFut<'a> {
        Box::pin(self.put_all_inner(bucket, entries))
    }

    fn keys<'a>(&'a self) -> Self::KeysFut<'a> {
        Box::pin(self.keys_inner())
    }

    fn delete<'a>(&'a self, bucket: &'a str) -> Self::DeleteFut<'a> {
        Box::pin(self.delete_inner(bucket))
    }

    fn lookup<'a>(&'a self, bucket: &'a str, request: &'a Request) -> Self::LookupFut<'a> {
        Box::pin(self.lookup_inner(bucket, request))
    }
}

fn is_valid_bucket_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
}

fn random_suffix() -> String {
    let value: u32 = rand::random();
    format!("{:08x}", value)
}

async fn read_index(dir: &Path) -> Result<Option<Vec<IndexEntry>>, CacheStoreError> {
    match tokio::fs::read(dir.join(INDEX_FILE)).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn read_bucket(dir: &Path) -> Result<Option<Bucket>, CacheStoreError> {
    let Some(index) = read_index(dir).await? else {
        return Ok(None);
    };
    let mut bucket = Bucket::new();
    for entry in index {
        let body = tokio::fs::read(dir.join(&entry.body_file)).await?;
        bucket.insert(
            entry.key,
            Response {
                status: entry.status,
                headers: entry.headers,
                body,
            },
        );
    }
    Ok(Some(bucket))
}

async fn write_bucket(dir: &Path, bucket: &Bucket) -> Result<(), CacheStoreError> {
    tokio::fs::create_dir_all(dir).await?;
    let mut index = Vec::with_capacity(bucket.len());
    for (position, (key, response)) in bucket.iter().enumerate() {
        let body_file = format!("{position}.body");
        tokio::fs::write(dir.join(&body_file), &response.body).await?;
        index.push(IndexEntry {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
            body_file,
        });
    }
    let index = serde_json::to_vec_pretty(&index)?;
    tokio::fs::write(dir.join(INDEX_FILE), index).await?;
    Ok(())
}
