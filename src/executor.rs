//! Retry loop around single HTTP attempts.

use crate::error::{ErrorKind, Result};
use crate::retry::{RetryConfig, RetryTracker};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use std::future::Future;
use tokio::time::sleep;

/// Keep calling `attempt` until it resolves one logical request.
///
/// A response whose status is not retryable is returned as-is, error
/// statuses included. Read timeouts and connection errors are retried within
/// their budgets and re-raised once exhausted. A refused connection is
/// returned immediately.
pub async fn execute_with_retries<F, Fut>(config: &RetryConfig, mut attempt: F) -> Result<HttpResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpResponse>>,
{
    let mut tracker = RetryTracker::new(config);

    loop {
        match attempt().await {
            Ok(response) => {
                tracker.status += 1;
                let code = response.status.as_u16();
                if !tracker.should_retry(Some(code)) {
                    return Ok(response);
                }
                let delay = tracker.get_backoff_time();
                log::warn!("Request failed with status {}, retrying in {:?}", code, delay);
                sleep(delay).await;
            }
            Err(err) => {
                match err.kind {
                    ErrorKind::ReadTimeout => tracker.read += 1,
                    ErrorKind::Connection => tracker.connect += 1,
                    _ => return Err(err),
                }
                if !tracker.should_retry(None) {
                    return Err(err);
                }
                let delay = tracker.get_backoff_time();
                log::warn!("Request failed: {}, retrying in {:?}", err, delay);
                sleep(delay).await;
            }
        }
    }
}

/// Executes requests over the shared transport with a retry budget
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    transport: HttpTransport,
    retry: RetryConfig,
    non_idempotent_retry: RetryConfig,
}

impl RequestExecutor {
    /// Create an executor for the given transport and idempotent retry budget
    pub fn new(transport: HttpTransport, retry: RetryConfig) -> Self {
        let non_idempotent_retry = retry.for_non_idempotent();
        Self {
            transport,
            retry,
            non_idempotent_retry,
        }
    }

    /// Execute one logical request.
    ///
    /// `idempotent` selects between the full retry budget and the reduced one
    /// used for writes that must not be replayed after a read timeout.
    pub async fn execute(&self, request: &HttpRequest, idempotent: bool) -> Result<HttpResponse> {
        let config = if idempotent {
            &self.retry
        } else {
            &self.non_idempotent_retry
        };
        execute_with_retries(config, || self.transport.send(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config() -> RetryConfig {
        RetryConfig::default()
            .with_backoff_factor(0.001)
            .with_max_backoff(Duration::from_millis(5))
    }

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&fast_config(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(response(200)) }
        })
        .await;
        assert_eq!(result.unwrap().status, StatusCode::OK);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_error_returned_without_retry() {
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&fast_config(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(response(400)) }
        })
        .await;
        assert_eq!(result.unwrap().status, StatusCode::BAD_REQUEST);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_status_then_success() {
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&fast_config(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move { Ok(response(if n < 2 { 503 } else { 200 })) }
        })
        .await;
        assert_eq!(result.unwrap().status, StatusCode::OK);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_status_budget_exhausted_returns_last_response() {
        let config = fast_config().with_max_retries_status(2);
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok(response(503)) }
        })
        .await;
        assert_eq!(result.unwrap().status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_timeout_budget() {
        let config = fast_config().with_max_retries_read(3);
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<HttpResponse, _>(Error::read_timeout()) }
        })
        .await;
        assert!(matches!(result.unwrap_err().kind, ErrorKind::ReadTimeout));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_connection_error_budget() {
        let config = fast_config().with_max_retries_connect(2);
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<HttpResponse, _>(Error::connection()) }
        })
        .await;
        assert!(matches!(result.unwrap_err().kind, ErrorKind::Connection));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connection_refused_is_never_retried() {
        let config = fast_config()
            .with_max_retries_connect(10)
            .with_max_retries_total(10);
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<HttpResponse, _>(Error::connection_refused()) }
        })
        .await;
        assert!(matches!(result.unwrap_err().kind, ErrorKind::ConnectionRefused));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_total_budget_spans_categories() {
        let config = fast_config().with_max_retries_total(2);
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&config, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n % 2 == 0 {
                    Err(Error::read_timeout())
                } else {
                    Err(Error::connection())
                }
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_idempotent_skips_read_retries() {
        let config = fast_config().for_non_idempotent();
        let attempts = AtomicU32::new(0);
        let result = execute_with_retries(&config, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<HttpResponse, _>(Error::read_timeout()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
