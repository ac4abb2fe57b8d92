//! Single-attempt HTTP transport.
//!
//! [`HttpTransport`] wraps the pooled `reqwest` client shared by every API
//! client. It performs exactly one HTTP call per [`HttpTransport::send`],
//! gzips JSON bodies on POST/PUT and maps low-level failures onto
//! [`ErrorKind::ReadTimeout`], [`ErrorKind::ConnectionRefused`] and
//! [`ErrorKind::Connection`]. Retrying is left to the executor.

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::Write;
use std::time::Duration;

/// One HTTP call to perform
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Optional JSON body
    pub body: Option<Value>,
    /// Request headers
    pub headers: HeaderMap,
    /// Per-attempt timeout overriding the client default
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request without body or query
    pub fn new<S: Into<String>>(method: Method, url: S) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Set the JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the query parameters
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Set the headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Value of the `X-Request-Id` header
    pub fn x_request_id(&self) -> Option<String> {
        self.headers
            .get("x-request-id")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::serialization(format!("Invalid response body: {}", e)).with_source(e)
        })
    }
}

/// Pooled HTTP transport shared by all API clients
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: HttpClient,
    disable_gzip: bool,
}

impl HttpTransport {
    /// Build the pooled client from the configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = HttpClient::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_connection_pool_size)
            .user_agent(&config.user_agent);

        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http_client = builder.build().map_err(|e| {
            Error::configuration(format!("Failed to build HTTP client: {}", e)).with_source(e)
        })?;

        Ok(Self {
            http_client,
            disable_gzip: config.disable_gzip,
        })
    }

    /// Perform a single HTTP attempt
    pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http_client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body)?;
            if self.should_gzip(&request.method) {
                builder = builder
                    .header(CONTENT_ENCODING, HeaderValue::from_static("gzip"))
                    .body(gzip(&payload)?);
            } else {
                builder = builder.body(payload);
            }
        }

        log::debug!("HTTP {} {}", request.method, request.url);
        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_transport_error)?;
        log::debug!(
            "HTTP {} {} - {} ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            body.len()
        );

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }

    fn should_gzip(&self, method: &Method) -> bool {
        !self.disable_gzip && (*method == Method::POST || *method == Method::PUT)
    }
}

fn gzip(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

/// Map a `reqwest` failure onto the transport error kinds.
///
/// Library layers wrap the real cause several times, so the whole source
/// chain is walked and the innermost `std::io::Error` decides.
pub(crate) fn classify_transport_error(err: reqwest::Error) -> Error {
    let kind = match innermost_io_error_kind(&err) {
        Some(std::io::ErrorKind::ConnectionRefused) => ErrorKind::ConnectionRefused,
        Some(std::io::ErrorKind::TimedOut) => ErrorKind::ReadTimeout,
        _ if err.is_timeout() => ErrorKind::ReadTimeout,
        _ if err.is_builder() => ErrorKind::Configuration {
            message: "Invalid request".to_string(),
        },
        _ => ErrorKind::Connection,
    };
    Error::new(kind).with_source(err)
}

fn innermost_io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut current = Some(err);
    let mut found = None;
    while let Some(error) = current {
        if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
            found = Some(io_error.kind());
        }
        current = error.source();
    }
    found
}
