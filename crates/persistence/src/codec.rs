//! Resource body codecs.
//!
//! The store keeps resource bodies as opaque text produced by a
//! [`ResourceCodec`]. Codecs must round-trip: `decode(encode(r)) == r` for
//! every resource they accept.

use serde_json::Value;

use crate::error::EncodingError;
use crate::types::Resource;

/// Converts resources to and from their stored text form.
pub trait ResourceCodec: Send + Sync {
    /// Encodes a resource body.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] if the resource is malformed. The store
    /// aborts the enclosing write when this happens.
    fn encode(&self, resource: &Resource) -> Result<String, EncodingError>;

    /// Decodes a stored body.
    fn decode(&self, text: &str) -> Result<Resource, EncodingError>;
}

/// JSON codec backed by `serde_json`.
///
/// Resources must have object content whose `resourceType` and `id` members
/// agree with the resource key.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a JSON codec.
    pub fn new() -> Self {
        Self
    }
}

impl ResourceCodec for JsonCodec {
    fn encode(&self, resource: &Resource) -> Result<String, EncodingError> {
        let invalid = |message: &str| EncodingError::InvalidResource {
            resource_type: resource.resource_type().to_string(),
            id: resource.id().to_string(),
            message: message.to_string(),
        };

        let obj = resource
            .content()
            .as_object()
            .ok_or_else(|| invalid("content must be a JSON object"))?;

        if obj.get("resourceType").and_then(Value::as_str) != Some(resource.resource_type()) {
            return Err(invalid("resourceType member does not match the resource type"));
        }
        if obj.get("id").and_then(Value::as_str) != Some(resource.id()) {
            return Err(invalid("id member does not match the resource id"));
        }

        serde_json::to_string(resource.content()).map_err(|e| EncodingError::Serialize {
            resource_type: resource.resource_type().to_string(),
            id: resource.id().to_string(),
            message: e.to_string(),
        })
    }

    fn decode(&self, text: &str) -> Result<Resource, EncodingError> {
        let value: Value = serde_json::from_str(text)?;
        Resource::from_json(value)
    }
}
