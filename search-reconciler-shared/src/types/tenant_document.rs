//! Tenant-isolating document wrapper.
//!
//! Every document written to the search index must carry the system-owned
//! `resource_path` field identifying the organization that owns it. Payloads
//! are caller-defined types with no shared base type, so the wrapper encodes
//! the tenant and the payload independently into JSON maps and merges them
//! before the final encode. The tenant field is written first and the
//! payload can never override it.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the system-owned isolation field present in every index document.
pub const TENANT_FIELD: &str = "resource_path";

/// Identifier of the organization owning a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Errors raised while encoding a [`TenantDocument`].
#[derive(Debug, Error)]
pub enum EncodingError {
    /// No tenant, or an empty one, was set before serializing.
    #[error("Tenant is not set")]
    MissingTenant,

    /// The tenant value could not be encoded.
    #[error("Failed to encode tenant: {0}")]
    Tenant(#[source] serde_json::Error),

    /// The payload could not be encoded.
    #[error("Failed to encode payload: {0}")]
    Payload(#[source] serde_json::Error),

    /// The payload encoded to something other than an object or null.
    #[error("Payload must encode to a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// A payload bound to the tenant that owns it.
///
/// Constructed immediately before a write and discarded afterwards.
///
/// # Example
///
/// ```
/// use search_reconciler_shared::{TenantDocument, TenantId};
/// use serde_json::json;
///
/// let payload = json!({ "conversation_id": "conv-1" });
/// let doc = TenantDocument::new(&payload).with_tenant(TenantId::new("org-1"));
/// let bytes = doc.to_json_bytes().unwrap();
/// assert_eq!(bytes, br#"{"resource_path":"org-1","conversation_id":"conv-1"}"#);
/// ```
#[derive(Debug, Clone)]
pub struct TenantDocument<P> {
    tenant: Option<TenantId>,
    payload: P,
}

impl<P: Serialize> TenantDocument<P> {
    /// Wrap a payload. The tenant must be set before serializing.
    pub fn new(payload: P) -> Self {
        Self {
            tenant: None,
            payload,
        }
    }

    /// Set the owning tenant, replacing any previous value.
    pub fn set_tenant(&mut self, tenant: TenantId) {
        self.tenant = Some(tenant);
    }

    /// Builder form of [`set_tenant`](Self::set_tenant).
    pub fn with_tenant(mut self, tenant: TenantId) -> Self {
        self.set_tenant(tenant);
        self
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Merge tenant and payload into a single ordered JSON map.
    ///
    /// The tenant field comes first. Payload fields keep their own order; a
    /// payload field named [`TENANT_FIELD`] is dropped. A payload encoding to
    /// `null` contributes no fields.
    pub fn to_json_map(&self) -> Result<Map<String, Value>, EncodingError> {
        let tenant = self
            .tenant
            .as_ref()
            .filter(|tenant| !tenant.is_empty())
            .ok_or(EncodingError::MissingTenant)?;
        let tenant_value = serde_json::to_value(tenant).map_err(EncodingError::Tenant)?;

        let payload_fields = match serde_json::to_value(&self.payload)
            .map_err(EncodingError::Payload)?
        {
            Value::Null => Map::new(),
            Value::Object(fields) => fields,
            other => return Err(EncodingError::NotAnObject(json_kind(&other))),
        };

        let mut merged = Map::with_capacity(payload_fields.len() + 1);
        merged.insert(TENANT_FIELD.to_string(), tenant_value);
        for (key, value) in payload_fields {
            if key == TENANT_FIELD {
                continue;
            }
            merged.insert(key, value);
        }

        debug_assert_eq!(
            merged.get(TENANT_FIELD).and_then(Value::as_str),
            Some(tenant.as_str())
        );
        Ok(merged)
    }

    /// Serialize to the JSON bytes sent to the search engine.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        let merged = self.to_json_map()?;
        serde_json::to_vec(&Value::Object(merged)).map_err(EncodingError::Payload)
    }
}

impl<P: Serialize> Serialize for TenantDocument<P> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let merged = self.to_json_map().map_err(serde::ser::Error::custom)?;
        merged.serialize(serializer)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
