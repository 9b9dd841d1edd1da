//! App Center REST client.
//!
//! Control-plane requests authenticate with the `X-API-Token` header.
//! Upload-domain and blob requests authenticate through their URL
//! (token query parameter or SAS signature) and never see the API token.
//! Proxy settings come from the standard `HTTP(S)_PROXY` variables.

use std::time::Duration;

use appcenter_protocol::API_VERSION;
use appcenter_protocol::constants::{
    API_TOKEN_HEADER, REQUEST_SOURCE, REQUEST_SOURCE_HEADER, is_retriable_status,
};
use bytes::Bytes;
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

/// Errors from the App Center client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid API token")]
    InvalidToken,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// `true` for retriable statuses and transport failures.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Api { status, .. } => is_retriable_status(*status),
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Client construction parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Control-plane base URL, e.g. `https://api.appcenter.ms`.
    pub base_url: String,
    pub api_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            timeout: Duration::from_secs(120),
            user_agent: format!("appcenter-distribute/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// App Center API client.
pub struct Client {
    api: reqwest::Client,
    upload: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        parse_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(API_TOKEN_HEADER),
            HeaderValue::from_str(&config.api_token).map_err(|_| Error::InvalidToken)?,
        );
        headers.insert(
            HeaderName::from_static(REQUEST_SOURCE_HEADER),
            HeaderValue::from_static(REQUEST_SOURCE),
        );

        let api = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        let upload = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            api,
            upload,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute control-plane URL for a path below the API version.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            API_VERSION,
            path.trim_start_matches('/')
        )
    }

    /// `GET` returning JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        policy: &RetryPolicy,
    ) -> Result<T, Error> {
        let body = self.send(policy, || self.api.get(url)).await?;
        parse_body(&body)
    }

    /// `POST` with a JSON body.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        policy: &RetryPolicy,
    ) -> Result<T, Error> {
        let body = self.send(policy, || self.api.post(url).json(body)).await?;
        parse_body(&body)
    }

    /// `PATCH` with a JSON body.
    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        policy: &RetryPolicy,
    ) -> Result<T, Error> {
        let body = self.send(policy, || self.api.patch(url).json(body)).await?;
        parse_body(&body)
    }

    /// `PUT` with a JSON body.
    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        policy: &RetryPolicy,
    ) -> Result<T, Error> {
        let body = self.send(policy, || self.api.put(url).json(body)).await?;
        parse_body(&body)
    }

    /// `POST` to the upload domain with an optional octet-stream body.
    ///
    /// `data` is shared between attempts, never copied.
    pub async fn post_bytes<T: DeserializeOwned>(
        &self,
        url: &str,
        data: Option<Bytes>,
        policy: &RetryPolicy,
    ) -> Result<T, Error> {
        let url = parse_url(url)?;
        let body = self
            .send(policy, || {
                let req = self.upload.post(url.clone());
                match &data {
                    Some(bytes) => req
                        .header(CONTENT_TYPE, "application/octet-stream")
                        .body(bytes.clone()),
                    None => req.header(CONTENT_TYPE, "application/json").body("{}"),
                }
            })
            .await?;
        parse_body(&body)
    }

    /// Uploads `data` as a block blob to a pre-signed URL.
    pub async fn put_blob(&self, url: &str, data: Bytes, policy: &RetryPolicy) -> Result<(), Error> {
        let url = parse_url(url)?;
        self.send(policy, || {
            self.upload
                .put(url.clone())
                .header("x-ms-blob-type", "BlockBlob")
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(data.clone())
        })
        .await?;
        Ok(())
    }

    /// Sends a request, retrying per `policy`, and returns the success body.
    async fn send<F>(&self, policy: &RetryPolicy, build: F) -> Result<Vec<u8>, Error>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut delays = policy.delays();
        let mut attempt = 1u32;

        loop {
            let err = match build().send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(url = %resp.url(), status = resp.status().as_u16(), attempt, "request succeeded");
                    return Ok(resp.bytes().await?.to_vec());
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    Error::Api { status, body }
                }
                Err(e) => Error::Http(e),
            };

            if !err.is_retriable() {
                return Err(err);
            }
            let Some(delay) = delays.next() else {
                if policy.max_attempts > 1 {
                    warn!(attempts = attempt, error = %err, "retries exhausted");
                }
                return Err(err);
            };

            warn!(
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retriable request failure"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|_| Error::InvalidUrl(url.to_string()))
}

/// Parses a JSON reply; an empty body is read as `{}`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(body)?)
}
