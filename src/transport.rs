//! HTTP transport capability used by the request layer.
//!
//! The digest engine and the call shapes only depend on the [`Transport`]
//! trait: a single `send` that either yields a complete response (any
//! status code) or a [`TransportError`]. Connection pooling, TLS and
//! redirect handling belong to the implementation; [`ReqwestTransport`]
//! is the production one.
//!
//! A transport never turns an HTTP error status into an error. Whether a
//! 401 is a protocol step or a failure is decided by the digest client
//! and the error normalizer, not here.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode, Url};

/// A fully-specified outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        HttpRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Request target as it appears on the request line: path plus query,
    /// without scheme, host or fragment.
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }
}

/// A complete response as seen by the caller.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Reason phrase for `status` (empty if the code has none).
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: String,
    /// Final URL after any redirects the transport followed.
    pub url: String,
}

impl HttpResponse {
    /// True for 4xx and 5xx statuses.
    pub fn is_error_status(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

/// Coarse classification of a transport failure. Rendered as a stable
/// lowercase code in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Redirect,
    Request,
    Body,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Redirect => "redirect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to complete an HTTP exchange.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be constructed (bad URL, invalid header, ...).
    /// Nothing was sent.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The request was attempted but no complete response arrived
    /// (DNS failure, refused connection, timeout, reset).
    #[error("{kind}: {message}")]
    Failed {
        kind: TransportErrorKind,
        message: String,
        /// URL the transport was talking to, if it reported one.
        url: Option<String>,
    },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return TransportError::Malformed(err.to_string());
        }

        // Timeout first: a connect timeout is also a connect error.
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_redirect() {
            TransportErrorKind::Redirect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };

        TransportError::Failed {
            kind,
            message: err.to_string(),
            url: err.url().map(Url::to_string),
        }
    }
}

/// Sends one HTTP request and returns the complete response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Timeouts applied by [`ReqwestTransport`].
///
/// Defaults:
/// - `connect_timeout`: 10 seconds (TCP + TLS handshake). Devices sit on
///   the local network, so anything slower means the host is unreachable.
/// - `timeout`: 30 seconds for the whole exchange including the body.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        TransportConfig {
            connect_timeout,
            timeout,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;
        Ok(ReqwestTransport { client })
    }

    /// Wraps an already configured client (custom TLS roots, proxies, ...).
    pub fn from_client(client: Client) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let url = resp.url().to_string();
        let body = resp.text().await?;

        Ok(HttpResponse {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            url,
        })
    }
}
