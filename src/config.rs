//! Client configuration.

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use std::time::Duration;
use url::Url;

/// Configuration for the Cognite client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the cluster, e.g. `https://api.cognitedata.com`
    pub base_url: Url,
    /// Project (tenant) name
    pub project: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Bearer token for authentication
    pub token: Option<String>,
    /// Name reported in the `x-cdp-app` header
    pub client_name: String,
    /// API version path segment
    pub api_version: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Connect timeout duration
    pub connect_timeout: Duration,
    /// Maximum number of concurrent requests in bulk operations
    pub max_workers: usize,
    /// Disable gzip compression of request bodies
    pub disable_gzip: bool,
    /// Maximum idle connections kept per host
    pub max_connection_pool_size: usize,
    /// Whether to verify SSL certificates
    pub verify_ssl: bool,
    /// Custom user agent string
    pub user_agent: String,
    /// Retry budget for idempotent requests
    pub retry: RetryConfig,
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// Create a new client configuration for a project on the given cluster
    pub fn new<S: AsRef<str>, P: Into<String>>(base_url: S, project: P) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self {
            base_url,
            project: project.into(),
            api_key: None,
            token: None,
            client_name: "cognite-rust-sdk".to_string(),
            api_version: crate::defaults::API_VERSION.to_string(),
            timeout: crate::defaults::TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            max_workers: crate::defaults::MAX_WORKERS,
            disable_gzip: false,
            max_connection_pool_size: crate::defaults::MAX_CONNECTION_POOL_SIZE,
            verify_ssl: true,
            user_agent: format!("CogniteRustSdk/{}", crate::VERSION),
            retry: RetryConfig::default(),
            headers: Vec::new(),
        })
    }

    /// Load the configuration from `COGNITE_*` environment variables.
    ///
    /// `COGNITE_PROJECT` is required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let project = std::env::var("COGNITE_PROJECT")
            .map_err(|_| Error::configuration("COGNITE_PROJECT is not set"))?;
        let base_url = std::env::var("COGNITE_BASE_URL")
            .unwrap_or_else(|_| crate::defaults::BASE_URL.to_string());

        let mut config = Self::new(base_url, project)?;
        if let Ok(api_key) = std::env::var("COGNITE_API_KEY") {
            config = config.with_api_key(api_key);
        }
        if let Ok(token) = std::env::var("COGNITE_TOKEN") {
            config = config.with_token(token);
        }
        if let Ok(client_name) = std::env::var("COGNITE_CLIENT_NAME") {
            config = config.with_client_name(client_name);
        }
        if let Some(max_workers) = env_number::<usize>("COGNITE_MAX_WORKERS")? {
            config = config.with_max_workers(max_workers);
        }
        if let Some(timeout) = env_number::<u64>("COGNITE_TIMEOUT")? {
            config = config.with_timeout(Duration::from_secs(timeout));
        }
        if let Some(max_retries) = env_number::<u32>("COGNITE_MAX_RETRIES")? {
            config.retry = config.retry.with_max_retries_total(max_retries);
        }
        if let Some(backoff) = env_number::<u64>("COGNITE_MAX_RETRY_BACKOFF")? {
            config.retry = config.retry.with_max_backoff(Duration::from_secs(backoff));
        }
        if let Ok(value) = std::env::var("COGNITE_DISABLE_GZIP") {
            config = config.with_disable_gzip(matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            ));
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the API key for authentication
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the bearer token for authentication
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the client name reported to the API
    pub fn with_client_name<S: Into<String>>(mut self, client_name: S) -> Self {
        self.client_name = client_name.into();
        self
    }

    /// Set the API version
    pub fn with_api_version<S: Into<String>>(mut self, api_version: S) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of concurrent requests
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Disable or enable gzip compression of request bodies
    pub fn with_disable_gzip(mut self, disable_gzip: bool) -> Self {
        self.disable_gzip = disable_gzip;
        self
    }

    /// Set the connection pool size
    pub fn with_max_connection_pool_size(mut self, size: usize) -> Self {
        self.max_connection_pool_size = size;
        self
    }

    /// Set SSL verification
    pub fn with_ssl_verification(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// Set the retry configuration
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Add a header sent with every request
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Check that the configuration can be used to build a client
    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::validation(
                "project must not be empty",
                Some("project".to_string()),
                None,
            ));
        }
        if self.max_workers == 0 {
            return Err(Error::validation(
                "max_workers must be at least 1",
                Some("max_workers".to_string()),
                Some(self.max_workers.to_string()),
            ));
        }
        Ok(())
    }

    /// URL prefix of every project-scoped resource
    pub fn project_url(&self) -> String {
        format!(
            "{}/api/{}/projects/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.api_version,
            self.project
        )
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| {
            Error::validation(
                format!("{} must be a number", name),
                Some(name.to_string()),
                Some(value),
            )
        }),
        Err(_) => Ok(None),
    }
}
