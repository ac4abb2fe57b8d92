//! # Cognite Rust SDK
//!
//! A Rust client library for the Cognite Data Fusion REST API.
//! The SDK turns method calls into HTTP requests and takes care of the
//! request orchestration every resource API shares.
//!
//! ## Features
//!
//! - **Generic resource operations**: retrieve, list, create, update, delete, search and aggregate
//! - **Cursor pagination** exposed as lazy async streams
//! - **Concurrent bulk requests** with item-level partial-failure reporting
//! - **Retries with exponential backoff** and per-category budgets
//! - **Gzip-compressed request bodies**
//! - **Async/await support** on the tokio runtime
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cognite_sdk::{CogniteClient, IdentifierSequence, ListMethod, Result};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = CogniteClient::with_api_key(
//!         "https://api.cognitedata.com",
//!         "my-project",
//!         "your-api-key",
//!     )?;
//!     let assets = client.api("/assets");
//!
//!     let all: Vec<Value> = assets.list(ListMethod::Post, None, Some(100)).await?;
//!     println!("Listed {} assets", all.len());
//!
//!     let ids = IdentifierSequence::of_ids(&[1, 2, 3])?;
//!     let some: Vec<Value> = assets.retrieve_multiple(&ids, true, false).await?;
//!     println!("Retrieved {} assets", some.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Bulk operations that partially fail return one error describing which
//! items were created, rejected or left in an unknown state:
//!
//! ```rust,no_run
//! use cognite_sdk::{CogniteClient, ErrorKind, WriteItem};
//! use serde_json::{json, Value};
//!
//! # async fn run(client: CogniteClient) -> cognite_sdk::Result<()> {
//! let items = vec![WriteItem::raw(json!({"externalId": "pump-1"}))?];
//! match client.api("/assets").create_multiple::<Value>(items, None, None).await {
//!     Ok(created) => println!("Created {}", created.len()),
//!     Err(err) => {
//!         if let ErrorKind::Api(api) = &err.kind {
//!             println!("API error {}: {}", api.code, api.message);
//!         }
//!         if let Some(outcome) = err.outcome() {
//!             println!("{} items failed", outcome.failed.len());
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api_client;
pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod identifier;
pub mod jobs;
pub mod pagination;
pub mod resource;
pub mod retry;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use api_client::ApiClient;
pub use client::{create_client, CogniteClient};
pub use config::ClientConfig;
pub use error::{ApiError, BulkOutcome, Error, ErrorKind, Result};

// Re-export request orchestration types
pub use bulk::{execute_tasks, TasksSummary};
pub use executor::{execute_with_retries, RequestExecutor};
pub use retry::{RetryConfig, RetryTracker};

// Re-export resource types
pub use identifier::{build_identifier_payload, process_ids, Identifier, IdentifierSequence};
pub use jobs::{ContextualizationJob, JobStatus};
pub use resource::{FilterSpec, ResourcePatch, UpdateItem, UpdateMode, WireFormat, WriteItem};
pub use types::{ListMethod, RequestLimits};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SDK name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Default API host
    pub const BASE_URL: &str = "https://api.cognitedata.com";

    /// Default API version
    pub const API_VERSION: &str = "v1";

    /// Default request timeout
    pub const TIMEOUT: Duration = Duration::from_secs(30);

    /// Default number of concurrent requests in bulk operations
    pub const MAX_WORKERS: usize = 10;

    /// Default size of the HTTP connection pool
    pub const MAX_CONNECTION_POOL_SIZE: usize = 50;

    /// Default number of items per request
    pub const REQUEST_LIMIT: usize = 1000;
}

/// Initialize the SDK with logging
///
/// This function sets up environment-based logging for the SDK.
/// Call this once at the start of your application.
///
/// # Example
///
/// ```rust
/// cognite_sdk::init_logging();
/// ```
pub fn init_logging() {
    let _ = env_logger::try_init();
}

/// Get the SDK version
pub fn version() -> &'static str {
    VERSION
}

/// Get the SDK name
pub fn name() -> &'static str {
    NAME
}
