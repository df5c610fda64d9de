use futures::future::BoxFuture;

use crate::ports;
use crate::types::http::{Method, Request, Response};

/// Network access over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestNetwork {
    client: reqwest::Client,
}

impl ReqwestNetwork {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

impl ports::Network for ReqwestNetwork {
    type Error = reqwest::Error;
    type Fut<'a>
        = BoxFuture<'a, Result<Response, Self::Error>>
    where
        Self: 'a;

    fn fetch<'a>(&'a self, request: &'a Request) -> Self::Fut<'a> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(to_reqwest_method(request.method), request.url.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let body = response.bytes().await?.to_vec();
            tracing::debug!(method = request.method.as_str(), url = %request.url, status, "network fetch");
            Ok(Response {
                status,
                headers,
                body,
            })
        })
    }
}
