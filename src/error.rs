//! Error types and handling for the Cognite Rust SDK.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Cognite SDK
#[derive(Debug)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Additional context about the error
    pub context: Option<String>,
    /// The underlying source error, if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Item-level outcome of a bulk operation, set on compound errors
    pub outcome: Option<Box<BulkOutcome>>,
}

/// Different kinds of errors that can occur
#[derive(Error, Debug)]
pub enum ErrorKind {
    /// The API answered with a non-success status code
    #[error("{0}")]
    Api(ApiError),

    /// The server did not answer within the configured timeout
    #[error("Read timed out")]
    ReadTimeout,

    /// The server actively refused the connection
    #[error("Connection refused")]
    ConnectionRefused,

    /// Any other connection-level failure (reset, DNS, TLS, ...)
    #[error("Connection error")]
    Connection,

    /// Invalid input rejected before a request was sent
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation
        field: Option<String>,
        /// Value that failed validation
        value: Option<String>,
        /// Validation error message
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Serialization error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// A contextualization job finished in the failed state
    #[error("Job {job_id} failed: {message}")]
    JobFailed {
        /// Server-side job id
        job_id: i64,
        /// Error message reported by the job
        message: String,
    },

    /// Internal SDK errors
    #[error("Internal error: {message}")]
    Internal {
        /// Internal error message
        message: String,
    },
}

/// An error response returned by the API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiError {
    /// HTTP status code
    pub code: u16,
    /// Error message from the response body
    pub message: String,
    /// Value of the `X-Request-Id` response header
    pub x_request_id: Option<String>,
    /// Identifiers reported missing by the API
    pub missing: Vec<Value>,
    /// Identifiers or values reported duplicated by the API
    pub duplicated: Vec<Value>,
    /// Any other fields of the error object
    pub extra: Map<String, Value>,
}

impl ApiError {
    /// Parse an API error from a response status, body and request id.
    ///
    /// Accepts both `{"error": {"message": ..., ...}}` and `{"error": "..."}`.
    /// Bodies in any other shape are kept verbatim as the message.
    pub fn from_response(code: u16, body: &[u8], x_request_id: Option<String>) -> Self {
        let mut error = ApiError {
            code,
            x_request_id,
            ..Default::default()
        };

        match serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|json| json.get("error").cloned())
        {
            Some(Value::String(message)) => error.message = message,
            Some(Value::Object(mut object)) => {
                error.message = match object.remove("message") {
                    Some(Value::String(message)) => message,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                error.missing = take_list(&mut object, "missing");
                error.duplicated = take_list(&mut object, "duplicated");
                object.remove("code");
                error.extra = object;
            }
            _ => error.message = String::from_utf8_lossy(body).into_owned(),
        }

        error
    }
}

fn take_list(object: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match object.remove(key) {
        Some(Value::Array(values)) => values,
        _ => Vec::new(),
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | code: {}", self.message, self.code)?;
        if let Some(request_id) = &self.x_request_id {
            write!(f, " | X-Request-ID: {}", request_id)?;
        }
        if !self.missing.is_empty() {
            write!(f, " | missing: {}", Value::Array(self.missing.clone()))?;
        }
        if !self.duplicated.is_empty() {
            write!(f, " | duplicated: {}", Value::Array(self.duplicated.clone()))?;
        }
        Ok(())
    }
}

/// Item-level picture of a bulk operation that did not fully succeed.
///
/// `failed` items were definitely rejected by the API (4xx). `unknown` items
/// were sent in requests that ended in a 5xx or a transport error, so they may
/// or may not have been applied server-side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    /// Items whose request succeeded
    pub successful: Vec<Value>,
    /// Items whose request was rejected by the API
    pub failed: Vec<Value>,
    /// Items whose request had an ambiguous outcome
    pub unknown: Vec<Value>,
}

impl Error {
    /// Create a new error with the given kind
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
            outcome: None,
        }
    }

    /// Create a new error with context
    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Create a new error with a source error
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach the outcome of a bulk operation
    pub fn with_outcome(mut self, outcome: BulkOutcome) -> Self {
        self.outcome = Some(Box::new(outcome));
        self
    }

    /// Create an API error
    pub fn api(error: ApiError) -> Self {
        Self::new(ErrorKind::Api(error))
    }

    /// Create a read timeout error
    pub fn read_timeout() -> Self {
        Self::new(ErrorKind::ReadTimeout)
    }

    /// Create a connection refused error
    pub fn connection_refused() -> Self {
        Self::new(ErrorKind::ConnectionRefused)
    }

    /// Create a generic connection error
    pub fn connection() -> Self {
        Self::new(ErrorKind::Connection)
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(
        message: S,
        field: Option<String>,
        value: Option<String>,
    ) -> Self {
        Self::new(ErrorKind::Validation {
            field,
            value,
            message: message.into(),
        })
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Serialization {
            message: message.into(),
        })
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Configuration {
            message: message.into(),
        })
    }

    /// Create a job failure error
    pub fn job_failed<S: Into<String>>(job_id: i64, message: S) -> Self {
        Self::new(ErrorKind::JobFailed {
            job_id,
            message: message.into(),
        })
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Internal {
            message: message.into(),
        })
    }

    /// The API error payload, if this is an API error
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.kind {
            ErrorKind::Api(error) => Some(error),
            _ => None,
        }
    }

    /// HTTP status code, if this is an API error
    pub fn status_code(&self) -> Option<u16> {
        self.api_error().map(|error| error.code)
    }

    /// Check if this error reports missing identifiers
    pub fn is_not_found(&self) -> bool {
        self.api_error()
            .map(|error| !error.missing.is_empty())
            .unwrap_or(false)
    }

    /// Check if this error was caused by a transport failure
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ReadTimeout | ErrorKind::ConnectionRefused | ErrorKind::Connection
        )
    }

    /// Outcome of the bulk operation this error was raised from
    pub fn outcome(&self) -> Option<&BulkOutcome> {
        self.outcome.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}: {}", context, self.kind)?;
        } else {
            write!(f, "{}", self.kind)?;
        }

        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }

        if let Some(outcome) = &self.outcome {
            write!(
                f,
                " [successful: {}, failed: {}, unknown: {}]",
                outcome.successful.len(),
                outcome.failed.len(),
                outcome.unknown.len()
            )?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// Conversion from common error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        crate::transport::classify_transport_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string()).with_source(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::configuration(format!("Invalid URL: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string()).with_source(err)
    }
}
