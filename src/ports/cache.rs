use crate::types::http::{CacheEntry, Request, Response};

/// Named cache buckets holding request/response pairs.
pub trait CacheStorage: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type PutFut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;
    type KeysFut<'a>: Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a
    where
        Self: 'a;
    type DeleteFut<'a>: Future<Output = Result<bool, Self::Error>> + Send + 'a
    where
        Self: 'a;
    type LookupFut<'a>: Future<Output = Result<Option<Response>, Self::Error>> + Send + 'a
    where
        Self: 'a;

    /// Opens `bucket` (creating it if absent) and adds every entry. Either all
    /// entries become visible or none do.
    fn put_all<'a>(&'a self, bucket: &'a str, entries: Vec<CacheEntry>) -> Self::PutFut<'a>;

    fn keys<'a>(&'a self) -> Self::KeysFut<'a>;

    /// Returns whether a bucket was actually removed.
    fn delete<'a>(&'a self, bucket: &'a str) -> Self::DeleteFut<'a>;

    fn lookup<'a>(&'a self, bucket: &'a str, request: &'a Request) -> Self::LookupFut<'a>;
}
