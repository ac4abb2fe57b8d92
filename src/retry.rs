//! Retry budgets and exponential backoff with full jitter.
//!
//! A [`RetryTracker`] is created for every logical request and counts the
//! failed attempts per category. It decides whether another attempt is
//! allowed and how long to sleep before making it.

use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Status codes retried by default
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 4] = [429, 502, 503, 504];

/// Retry budget and backoff settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries across all categories; `n` allows n + 1 attempts
    pub max_retries_total: u32,
    /// Maximum number of retries caused by a retryable status code
    pub max_retries_status: u32,
    /// Maximum number of retries caused by read timeouts
    pub max_retries_read: u32,
    /// Maximum number of retries caused by connection errors
    pub max_retries_connect: u32,
    /// Base of the exponential backoff, in seconds
    pub backoff_factor: f64,
    /// Upper bound of a single backoff sleep
    pub max_backoff: Duration,
    /// Status codes that trigger a retry
    pub status_codes_to_retry: BTreeSet<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries_total: 10,
            max_retries_status: 10,
            max_retries_read: 5,
            max_retries_connect: 5,
            backoff_factor: 0.5,
            max_backoff: Duration::from_secs(30),
            status_codes_to_retry: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
        }
    }
}

impl RetryConfig {
    /// Configuration that never retries
    pub fn disabled() -> Self {
        Self {
            max_retries_total: 0,
            max_retries_status: 0,
            max_retries_read: 0,
            max_retries_connect: 0,
            ..Default::default()
        }
    }

    /// Set the overall retry budget
    pub fn with_max_retries_total(mut self, max_retries: u32) -> Self {
        self.max_retries_total = max_retries;
        self
    }

    /// Set the status retry budget
    pub fn with_max_retries_status(mut self, max_retries: u32) -> Self {
        self.max_retries_status = max_retries;
        self
    }

    /// Set the read timeout retry budget
    pub fn with_max_retries_read(mut self, max_retries: u32) -> Self {
        self.max_retries_read = max_retries;
        self
    }

    /// Set the connection error retry budget
    pub fn with_max_retries_connect(mut self, max_retries: u32) -> Self {
        self.max_retries_connect = max_retries;
        self
    }

    /// Set the backoff factor in seconds
    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Set the maximum backoff
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Replace the set of retryable status codes
    pub fn with_status_codes_to_retry<I: IntoIterator<Item = u16>>(mut self, codes: I) -> Self {
        self.status_codes_to_retry = codes.into_iter().collect();
        self
    }

    /// Derive the budget used for requests that are not safe to replay.
    ///
    /// Only rate limiting (429) is retried on status, and read timeouts are
    /// never retried since the server may already have applied the write.
    pub fn for_non_idempotent(&self) -> Self {
        Self {
            max_retries_read: 0,
            status_codes_to_retry: [429].into_iter().collect(),
            ..self.clone()
        }
    }
}

/// Per-request retry counters
#[derive(Debug)]
pub struct RetryTracker<'a> {
    config: &'a RetryConfig,
    /// Attempts that ended with a response
    pub status: u32,
    /// Attempts that ended with a read timeout
    pub read: u32,
    /// Attempts that ended with a connection error
    pub connect: u32,
}

impl<'a> RetryTracker<'a> {
    /// Create a fresh tracker for one logical request
    pub fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            status: 0,
            read: 0,
            connect: 0,
        }
    }

    /// Number of failed attempts so far
    pub fn total(&self) -> u32 {
        self.status + self.read + self.connect
    }

    /// Whether another attempt is allowed after the last recorded failure.
    ///
    /// Each budget is the number of retries permitted, so a counter may reach
    /// its cap and still be retried once more: `max_retries_total = n` allows
    /// n + 1 attempts in total, and likewise for the per-category caps.
    pub fn should_retry(&self, status_code: Option<u16>) -> bool {
        if self.total() > self.config.max_retries_total {
            return false;
        }
        if self.status > self.config.max_retries_status
            || self.read > self.config.max_retries_read
            || self.connect > self.config.max_retries_connect
        {
            return false;
        }
        match status_code {
            Some(code) => self.config.status_codes_to_retry.contains(&code),
            None => true,
        }
    }

    /// Sleep duration before the next attempt.
    ///
    /// `backoff_factor * 2^total`, capped at `max_backoff`, scaled by a
    /// uniform factor in `[0, 1)`.
    pub fn get_backoff_time(&self) -> Duration {
        let exponent = self.total().min(62) as i32;
        let backoff = self.config.backoff_factor.max(0.0) * 2f64.powi(exponent);
        let capped = backoff.min(self.config.max_backoff.as_secs_f64());
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        Duration::from_secs_f64(capped * jitter)
    }
}
