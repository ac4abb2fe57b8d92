//! Cognite Rust SDK Client
//!
//! [`CogniteClient`] is constructed once per configuration. It builds the
//! pooled HTTP transport and the default headers, and hands out cheap
//! [`ApiClient`] handles that share them.

use crate::api_client::ApiClient;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::executor::RequestExecutor;
use crate::transport::HttpTransport;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;

/// State shared by every API client created from one [`CogniteClient`]
#[derive(Debug)]
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) executor: RequestExecutor,
    pub(crate) project_url: String,
    pub(crate) headers: HeaderMap,
}

/// Main Cognite client
#[derive(Debug, Clone)]
pub struct CogniteClient {
    inner: Arc<ClientInner>,
}

impl CogniteClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let transport = HttpTransport::new(&config)?;
        let executor = RequestExecutor::new(transport, config.retry.clone());
        let headers = default_headers(&config)?;
        let project_url = config.project_url();

        log::info!("Initialized Cognite client for {}", project_url);
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                executor,
                project_url,
                headers,
            }),
        })
    }

    /// Create a client configured from `COGNITE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a client with API key authentication
    pub fn with_api_key<U, P, K>(url: U, project: P, api_key: K) -> Result<Self>
    where
        U: AsRef<str>,
        P: Into<String>,
        K: Into<String>,
    {
        Self::new(ClientConfig::new(url, project)?.with_api_key(api_key))
    }

    /// Create a client with bearer token authentication
    pub fn with_token<U, P, T>(url: U, project: P, token: T) -> Result<Self>
    where
        U: AsRef<str>,
        P: Into<String>,
        T: Into<String>,
    {
        Self::new(ClientConfig::new(url, project)?.with_token(token))
    }

    /// The configuration this client was built from
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// API client for the resource collection at `resource_path`, e.g. `/assets`
    pub fn api<S: Into<String>>(&self, resource_path: S) -> ApiClient {
        ApiClient::new(Arc::clone(&self.inner), resource_path)
    }
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        "x-cdp-sdk",
        header_value(&format!("CogniteRustSdk:{}", crate::VERSION))?,
    );
    headers.insert("x-cdp-app", header_value(&config.client_name)?);

    if let Some(api_key) = &config.api_key {
        headers.insert("api-key", header_value(api_key)?);
    } else if let Some(token) = &config.token {
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
    }

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::configuration(format!("Invalid header name {}: {}", name, e)))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::configuration(format!("Invalid header value: {}", e)))
}

/// Convenience function to create a Cognite client
pub fn create_client(config: ClientConfig) -> Result<CogniteClient> {
    CogniteClient::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let config = ClientConfig::new("http://localhost:8080", "test").unwrap();
        let client = CogniteClient::new(config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ClientConfig::new("http://localhost:8080", "test")
            .unwrap()
            .with_max_workers(0);
        assert!(CogniteClient::new(config).is_err());
    }

    #[test]
    fn test_default_headers() {
        let config = ClientConfig::new("http://localhost:8080", "test")
            .unwrap()
            .with_api_key("secret")
            .with_client_name("my-app")
            .with_header("x-custom", "1");
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers["api-key"], "secret");
        assert_eq!(headers["x-cdp-app"], "my-app");
        assert_eq!(headers["x-custom"], "1");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers["x-cdp-sdk"]
            .to_str()
            .unwrap()
            .starts_with("CogniteRustSdk:"));
    }

    #[test]
    fn test_token_header() {
        let config = ClientConfig::new("http://localhost:8080", "test")
            .unwrap()
            .with_token("abc");
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let config = ClientConfig::new("http://localhost:8080", "test")
            .unwrap()
            .with_header("bad header", "x");
        assert!(default_headers(&config).is_err());
    }

    #[test]
    fn test_api_handle_shares_state() {
        let config = ClientConfig::new("http://localhost:8080", "test").unwrap();
        let client = CogniteClient::new(config).unwrap();
        let assets = client.api("/assets");
        assert_eq!(assets.resource_path(), "/assets");
        assert_eq!(Arc::strong_count(&client.inner), 2);
    }
}
