use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use sandbox::{Result, SandboxError};
use serde::de::DeserializeOwned;
use tracing::info;

/// Shared HTTP client for the provider API. Owns the connection pool, base
/// URL and API key. Clone is a cheap Arc refcount bump.
#[derive(Clone)]
pub(crate) struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpClient {
    pub(crate) fn new(api_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SandboxError::InvalidConfig(format!("http client: {e}")))?;

        let api_url = api_url.trim_end_matches('/').to_string();
        info!(api_url = %api_url, api_key = api_key.is_some(), "provider client initialized");

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                api_url,
                api_key,
            }),
        })
    }

    /// Build a request against `path` (appended to the base URL), with bearer
    /// auth when an API key is configured.
    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.inner.api_url);
        let req = self.inner.client.request(method, url);
        match &self.inner.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

/// Send a request and map transport failures.
pub(crate) async fn send(req: reqwest::RequestBuilder, what: &str) -> Result<Response> {
    let resp = req
        .send()
        .await
        .map_err(|e| SandboxError::Transport(format!("{what}: {e}")))?;
    check(resp, what).await
}

/// Turn a non-2xx response into a typed error carrying status text and body.
pub(crate) async fn check(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SandboxError::from_status(
        status.as_u16(),
        &status.to_string(),
        what,
        &body,
    ))
}

pub(crate) async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    resp.json()
        .await
        .map_err(|e| SandboxError::Decode(format!("{what} decode: {e}")))
}
