#![allow(dead_code)]

use cognite_sdk::{ClientConfig, CogniteClient, RetryConfig};
use std::time::Duration;

pub const PROJECT: &str = "test";

/// Path prefix of every project-scoped resource on the mock server
pub fn project_path(resource: &str) -> String {
    format!("/api/v1/projects/{}{}", PROJECT, resource)
}

/// Retry budget with near-zero backoff
pub fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_backoff_factor(0.001)
        .with_max_backoff(Duration::from_millis(5))
}

/// Configuration pointing at `url` with uncompressed bodies so they can be matched
pub fn config(url: &str) -> ClientConfig {
    ClientConfig::new(url, PROJECT)
        .unwrap()
        .with_api_key("test-key")
        .with_client_name("integration-tests")
        .with_disable_gzip(true)
        .with_retry(fast_retry())
}

pub fn client(url: &str) -> CogniteClient {
    CogniteClient::new(config(url)).unwrap()
}
