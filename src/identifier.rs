//! Resource identifiers and their wire encodings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Either an internal numeric id or a user-chosen external id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Identifier {
    /// Numeric id assigned by the server
    Id(i64),
    /// External id assigned by the user
    ExternalId(String),
}

impl Identifier {
    /// `{"id": ...}` or `{"externalId": ...}`
    pub fn as_wrapped(&self) -> Value {
        match self {
            Identifier::Id(id) => json!({ "id": id }),
            Identifier::ExternalId(external_id) => json!({ "externalId": external_id }),
        }
    }

    /// Bare identifier, only defined for numeric ids
    pub fn as_primitive(&self) -> Result<Value> {
        match self {
            Identifier::Id(id) => Ok(json!(id)),
            Identifier::ExternalId(_) => Err(external_ids_must_be_wrapped()),
        }
    }

    /// Read an identifier back from a wrapped wire object
    pub fn from_wire(value: &Value) -> Option<Self> {
        if let Some(id) = value.get("id").and_then(Value::as_i64) {
            return Some(Identifier::Id(id));
        }
        value
            .get("externalId")
            .and_then(Value::as_str)
            .map(|external_id| Identifier::ExternalId(external_id.to_string()))
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Id(id)
    }
}

impl From<&str> for Identifier {
    fn from(external_id: &str) -> Self {
        Identifier::ExternalId(external_id.to_string())
    }
}

impl From<String> for Identifier {
    fn from(external_id: String) -> Self {
        Identifier::ExternalId(external_id)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "id={}", id),
            Identifier::ExternalId(external_id) => write!(f, "externalId={}", external_id),
        }
    }
}

/// An ordered, non-empty collection of identifiers.
///
/// Numeric ids always precede external ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSequence {
    identifiers: Vec<Identifier>,
}

impl IdentifierSequence {
    /// Combine ids and external ids, failing if both are empty
    pub fn new(ids: Option<&[i64]>, external_ids: Option<&[String]>) -> Result<Self> {
        let ids = ids.unwrap_or_default();
        let external_ids = external_ids.unwrap_or_default();
        if ids.is_empty() && external_ids.is_empty() {
            return Err(Error::validation(
                "At least one of ids and external_ids must be specified",
                Some("ids".to_string()),
                None,
            ));
        }

        let identifiers = ids
            .iter()
            .copied()
            .map(Identifier::Id)
            .chain(external_ids.iter().cloned().map(Identifier::ExternalId))
            .collect();
        Ok(Self { identifiers })
    }

    /// Sequence holding a single identifier
    pub fn single<I: Into<Identifier>>(identifier: I) -> Self {
        Self {
            identifiers: vec![identifier.into()],
        }
    }

    /// Sequence of numeric ids
    pub fn of_ids(ids: &[i64]) -> Result<Self> {
        Self::new(Some(ids), None)
    }

    /// Sequence of external ids
    pub fn of_external_ids(external_ids: &[String]) -> Result<Self> {
        Self::new(None, Some(external_ids))
    }

    /// Whether the request addressed exactly one resource
    pub fn is_singleton(&self) -> bool {
        self.identifiers.len() == 1
    }

    /// Number of identifiers
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Whether the sequence holds no identifiers
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// The identifiers in wire order
    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    /// Encode for a request body.
    ///
    /// Wrapped entries are `{"id": ..}` / `{"externalId": ..}` objects.
    /// Unwrapped encoding is the legacy bare-id shape and rejects external ids.
    pub fn as_wire(&self, wrap_ids: bool) -> Result<Vec<Value>> {
        if wrap_ids {
            Ok(self.identifiers.iter().map(Identifier::as_wrapped).collect())
        } else {
            self.identifiers.iter().map(Identifier::as_primitive).collect()
        }
    }
}

/// Build the identifier list of a multi-resource request
pub fn process_ids(
    ids: Option<&[i64]>,
    external_ids: Option<&[String]>,
    wrap_ids: bool,
) -> Result<Vec<Value>> {
    IdentifierSequence::new(ids, external_ids)?.as_wire(wrap_ids)
}

/// Wrapped identifier payload, ids first
pub fn build_identifier_payload(ids: &[i64], external_ids: &[String]) -> Result<Vec<Value>> {
    process_ids(Some(ids), Some(external_ids), true)
}

fn external_ids_must_be_wrapped() -> Error {
    Error::validation(
        "External ids must be wrapped",
        Some("wrap_ids".to_string()),
        Some("false".to_string()),
    )
}
