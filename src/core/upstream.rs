//! Upstream API forwarding
//!
//! This module defines the seam between the proxy handler and the real
//! OpenAI-compatible API, plus the reqwest-backed implementation.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Error types for upstream operations
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream request timed out")]
    Timeout,

    #[error("Failed to connect to upstream: {0}")]
    Connect(String),

    #[error("Failed to read upstream response body: {0}")]
    Body(String),

    #[error("Unexpected upstream error: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_connect() {
            UpstreamError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            UpstreamError::Body(e.to_string())
        } else {
            UpstreamError::Unexpected(e.to_string())
        }
    }
}

/// Request as it will be sent upstream
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Path plus optional query string, e.g. `/v1/chat/completions`
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Relay the response body as it arrives instead of buffering it
    pub stream: bool,
}

/// Response body from upstream
pub enum UpstreamBody {
    Full(Bytes),
    Stream(BoxStream<'static, Result<Bytes, UpstreamError>>),
}

impl std::fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            UpstreamBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Response received from upstream
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: UpstreamBody,
}

/// Trait for anything the proxy can forward requests to
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send a request and return the upstream status and body
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;

    /// Base URL requests are forwarded to
    fn base_url(&self) -> &str;
}

/// Headers that describe the client connection rather than the request
const SKIPPED_HEADERS: [header::HeaderName; 7] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::ACCEPT_ENCODING,
];

/// Copy client headers that are safe to forward
pub fn forwardable_headers(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = incoming.clone();
    for name in SKIPPED_HEADERS.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers
}

/// reqwest-backed upstream
pub struct HttpUpstream {
    client: Client,
    base_url: String,
}

impl HttpUpstream {
    /// Create an upstream for `base_url` with a per-request timeout
    ///
    /// # Arguments
    ///
    /// * `base_url` - Upstream origin, e.g. `https://api.openai.com`
    /// * `timeout` - Request timeout in seconds
    pub fn new(base_url: &str, timeout: u64) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| UpstreamError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn target_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.target_url(&request.path_and_query);
        debug!("Forwarding {} {}", request.method, url);

        let response = self
            .client
            .request(request.method, &url)
            .headers(forwardable_headers(&request.headers))
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();

        let body = if request.stream {
            UpstreamBody::Stream(
                response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(UpstreamError::from))
                    .boxed(),
            )
        } else {
            UpstreamBody::Full(response.bytes().await?)
        };

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
