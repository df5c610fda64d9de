use crate::types::http::{Request, Response};

pub trait Network: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<Response, Self::Error>> + Send + 'a
    where
        Self: 'a;

    /// Performs the request. Any HTTP status is a successful fetch; only transport
    /// failures are errors.
    fn fetch<'a>(&'a self, request: &'a Request) -> Self::Fut<'a>;
}
