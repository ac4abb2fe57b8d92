//! Request-side resource representations.
//!
//! Inputs to create, update and search arrive either as raw JSON structures
//! or as typed values. The distinction is made once, when the input is
//! converted into its wire form, and never inspected again further down.

use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::utils::{convert_keys_to_camel_case, to_camel_case};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Anything that can render itself in the API's camelCase wire format
pub trait WireFormat {
    /// Produce the JSON sent to the API
    fn to_wire_format(&self) -> Result<Value>;
}

impl<T: Serialize> WireFormat for T {
    fn to_wire_format(&self) -> Result<Value> {
        let value = match serde_json::to_value(self)? {
            // unset attributes are omitted rather than sent as null
            Value::Object(object) => Value::Object(
                object
                    .into_iter()
                    .filter(|(_, value)| !value.is_null())
                    .collect(),
            ),
            other => other,
        };
        Ok(convert_keys_to_camel_case(value))
    }
}

/// One item of a create request
pub enum WriteItem {
    /// A JSON object sent exactly as given
    Raw(Map<String, Value>),
    /// A typed resource converted through [`WireFormat`]
    Typed(Box<dyn WireFormat + Send + Sync>),
}

impl WriteItem {
    /// Wrap a typed resource
    pub fn typed<R: WireFormat + Send + Sync + 'static>(resource: R) -> Self {
        WriteItem::Typed(Box::new(resource))
    }

    /// Wrap a raw JSON object
    pub fn raw(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(WriteItem::Raw(object)),
            other => Err(Error::validation(
                "raw items must be JSON objects",
                Some("item".to_string()),
                Some(other.to_string()),
            )),
        }
    }

    /// Convert into the JSON sent to the API
    pub fn into_wire(self) -> Result<Value> {
        match self {
            WriteItem::Raw(object) => Ok(Value::Object(object)),
            WriteItem::Typed(resource) => resource.to_wire_format(),
        }
    }
}

impl From<Map<String, Value>> for WriteItem {
    fn from(object: Map<String, Value>) -> Self {
        WriteItem::Raw(object)
    }
}

impl std::fmt::Debug for WriteItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteItem::Raw(object) => f.debug_tuple("Raw").field(object).finish(),
            WriteItem::Typed(_) => f.write_str("Typed(..)"),
        }
    }
}

/// A single patch operation on one attribute
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Replace the value
    Set(Value),
    /// Clear the value
    SetNull,
    /// Add elements to a list attribute
    Add(Vec<Value>),
    /// Remove elements from a list attribute
    Remove(Vec<Value>),
}

impl PatchOp {
    fn to_wire(&self) -> Value {
        match self {
            PatchOp::Set(value) => json!({ "set": value }),
            PatchOp::SetNull => json!({ "setNull": true }),
            PatchOp::Add(values) => json!({ "add": values }),
            PatchOp::Remove(values) => json!({ "remove": values }),
        }
    }
}

/// Partial update of one resource.
///
/// Resource wrappers expose named setters that append to this builder:
///
/// ```rust
/// use cognite_sdk::ResourcePatch;
///
/// let patch = ResourcePatch::external_id("pump-1")
///     .set("name", "Pump 1")
///     .set_null("description");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePatch {
    identifier: Identifier,
    operations: Vec<(String, PatchOp)>,
}

impl ResourcePatch {
    /// Patch the resource with the given identifier
    pub fn new<I: Into<Identifier>>(identifier: I) -> Self {
        Self {
            identifier: identifier.into(),
            operations: Vec::new(),
        }
    }

    /// Patch the resource with the given numeric id
    pub fn id(id: i64) -> Self {
        Self::new(Identifier::Id(id))
    }

    /// Patch the resource with the given external id
    pub fn external_id<S: Into<String>>(external_id: S) -> Self {
        Self::new(Identifier::ExternalId(external_id.into()))
    }

    /// Set an attribute
    pub fn set<K: AsRef<str>, V: Into<Value>>(self, field: K, value: V) -> Self {
        self.push(field, PatchOp::Set(value.into()))
    }

    /// Clear an attribute
    pub fn set_null<K: AsRef<str>>(self, field: K) -> Self {
        self.push(field, PatchOp::SetNull)
    }

    /// Add elements to a list attribute
    pub fn add<K: AsRef<str>, V: Into<Value>>(self, field: K, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(field, PatchOp::Add(values))
    }

    /// Remove elements from a list attribute
    pub fn remove<K: AsRef<str>, V: Into<Value>>(self, field: K, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(field, PatchOp::Remove(values))
    }

    fn push<K: AsRef<str>>(mut self, field: K, op: PatchOp) -> Self {
        let field = to_camel_case(field.as_ref());
        match self.operations.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = op,
            None => self.operations.push((field, op)),
        }
        self
    }

    /// Identifier of the patched resource
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Whether no operation was recorded
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// `{"id"|"externalId": .., "update": {field: {op: value}}}`
    pub fn to_wire(&self) -> Value {
        let update: Map<String, Value> = self
            .operations
            .iter()
            .map(|(field, op)| (field.clone(), op.to_wire()))
            .collect();
        let mut object = match self.identifier.as_wrapped() {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        object.insert("update".to_string(), Value::Object(update));
        Value::Object(object)
    }
}

/// How a full resource is turned into a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Only attributes with a value are set
    #[default]
    Patch,
    /// Attributes without a value are cleared
    Replace,
}

/// One item of an update request
#[derive(Debug, Clone)]
pub enum UpdateItem {
    /// An explicit patch
    Patch(ResourcePatch),
    /// A full resource, diffed against the attributes the API can update
    Resource {
        /// Wire form of the resource
        item: Value,
        /// camelCase names of the updatable attributes
        updatable: Vec<String>,
    },
}

impl UpdateItem {
    /// Update a full resource restricted to `updatable` attributes
    pub fn resource<R: WireFormat + ?Sized>(resource: &R, updatable: &[&str]) -> Result<Self> {
        Ok(UpdateItem::Resource {
            item: resource.to_wire_format()?,
            updatable: updatable.iter().map(|name| to_camel_case(name)).collect(),
        })
    }

    /// Convert into the wire patch object
    pub fn into_wire(self, mode: UpdateMode) -> Result<Value> {
        match self {
            UpdateItem::Patch(patch) => Ok(patch.to_wire()),
            UpdateItem::Resource { item, updatable } => {
                resource_to_patch(&item, &updatable, mode).map(|patch| patch.to_wire())
            }
        }
    }
}

impl From<ResourcePatch> for UpdateItem {
    fn from(patch: ResourcePatch) -> Self {
        UpdateItem::Patch(patch)
    }
}

fn resource_to_patch(item: &Value, updatable: &[String], mode: UpdateMode) -> Result<ResourcePatch> {
    let identifier = Identifier::from_wire(item).ok_or_else(|| {
        Error::validation(
            "An update item must have an id or an externalId",
            Some("id".to_string()),
            None,
        )
    })?;

    let mut patch = ResourcePatch::new(identifier);
    for field in updatable {
        match item.get(field) {
            Some(Value::Null) | None => {
                if mode == UpdateMode::Replace {
                    patch = patch.set_null(field);
                }
            }
            Some(value) => patch = patch.set(field, value.clone()),
        }
    }
    Ok(patch)
}

/// A filter sent with list, search and aggregate requests
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    /// A JSON object sent exactly as given
    Raw(Map<String, Value>),
    /// A typed filter, already converted to camelCase
    Typed(Map<String, Value>),
}

impl FilterSpec {
    /// Convert a typed filter to the camelCase wire convention
    pub fn typed<F: WireFormat + ?Sized>(filter: &F) -> Result<Self> {
        match filter.to_wire_format()? {
            Value::Object(object) => Ok(FilterSpec::Typed(object)),
            other => Err(Error::validation(
                "filters must serialize to JSON objects",
                Some("filter".to_string()),
                Some(other.to_string()),
            )),
        }
    }

    /// Use a raw JSON object
    pub fn raw(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(FilterSpec::Raw(object)),
            other => Err(Error::validation(
                "filters must be JSON objects",
                Some("filter".to_string()),
                Some(other.to_string()),
            )),
        }
    }

    /// The wire object
    pub fn as_map(&self) -> &Map<String, Value> {
        match self {
            FilterSpec::Raw(object) | FilterSpec::Typed(object) => object,
        }
    }

    /// The wire value
    pub fn to_value(&self) -> Value {
        Value::Object(self.as_map().clone())
    }
}
