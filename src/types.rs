//! Common types used throughout the Cognite SDK.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-operation ceilings on the number of items sent in one request.
///
/// Bulk operations split their input client-side so that no single request
/// exceeds these limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Items per create request
    pub create: usize,
    /// Page size of list requests
    pub list: usize,
    /// Identifiers per retrieve request
    pub retrieve: usize,
    /// Items per update request
    pub update: usize,
    /// Identifiers per delete request
    pub delete: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self::uniform(crate::defaults::REQUEST_LIMIT)
    }
}

impl RequestLimits {
    /// Use the same limit for every operation
    pub fn uniform(limit: usize) -> Self {
        Self {
            create: limit,
            list: limit,
            retrieve: limit,
            update: limit,
            delete: limit,
        }
    }

    /// Set the create limit
    pub fn with_create(mut self, limit: usize) -> Self {
        self.create = limit;
        self
    }

    /// Set the list page size
    pub fn with_list(mut self, limit: usize) -> Self {
        self.list = limit;
        self
    }

    /// Set the retrieve limit
    pub fn with_retrieve(mut self, limit: usize) -> Self {
        self.retrieve = limit;
        self
    }

    /// Set the update limit
    pub fn with_update(mut self, limit: usize) -> Self {
        self.update = limit;
        self
    }

    /// Set the delete limit
    pub fn with_delete(mut self, limit: usize) -> Self {
        self.delete = limit;
        self
    }
}

/// How a resource's list endpoint receives filter, limit and cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListMethod {
    /// `GET /{resource}` with query parameters
    Get,
    /// `POST /{resource}/list` with a JSON body
    Post,
}

impl fmt::Display for ListMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListMethod::Get => write!(f, "GET"),
            ListMethod::Post => write!(f, "POST"),
        }
    }
}

impl Default for ListMethod {
    fn default() -> Self {
        ListMethod::Post
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = RequestLimits::default();
        assert_eq!(limits.create, 1000);
        assert_eq!(limits.list, 1000);
        assert_eq!(limits.retrieve, 1000);
        assert_eq!(limits.update, 1000);
        assert_eq!(limits.delete, 1000);
    }

    #[test]
    fn test_limit_builders() {
        let limits = RequestLimits::default().with_create(1).with_delete(10);
        assert_eq!(limits.create, 1);
        assert_eq!(limits.delete, 10);
        assert_eq!(limits.list, 1000);
    }

    #[test]
    fn test_list_method_display() {
        assert_eq!(ListMethod::Get.to_string(), "GET");
        assert_eq!(ListMethod::Post.to_string(), "POST");
        assert_eq!(serde_json::to_string(&ListMethod::Post).unwrap(), "\"POST\"");
    }
}
