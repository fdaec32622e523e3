//! Resource and resource key types.
//!
//! A [`Resource`] is a typed, identified JSON document. Its body is opaque to
//! the store apart from the `resourceType` and `id` members, which the
//! constructor stamps into the content so that an encoded body always carries
//! its own key.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EncodingError, ValidationError};

/// Identity of a stored resource: `(resource_type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// The resource type (e.g., "Patient").
    pub resource_type: String,
    /// The logical id, unique within the type.
    pub id: String,
}

impl ResourceKey {
    /// Creates a new key.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Checks that neither part of the key is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.resource_type.is_empty() {
            return Err(ValidationError::EmptyResourceType);
        }
        if self.id.is_empty() {
            return Err(ValidationError::EmptyResourceId {
                resource_type: self.resource_type.clone(),
            });
        }
        Ok(())
    }

    /// Parses a relative reference such as `Patient/123`.
    pub fn parse(reference: &str) -> Option<Self> {
        let (resource_type, id) = reference.split_once('/')?;
        if resource_type.is_empty() || id.is_empty() || id.contains('/') {
            return None;
        }
        Some(Self::new(resource_type, id))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// A typed, identified resource.
///
/// # Examples
///
/// ```
/// use helios_resource_store::types::Resource;
/// use serde_json::json;
///
/// let patient = Resource::new("Patient", "p1", json!({"active": true}));
///
/// assert_eq!(patient.key().to_string(), "Patient/p1");
/// assert_eq!(patient.content()["resourceType"], "Patient");
/// assert_eq!(patient.content()["id"], "p1");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    resource_type: String,
    id: String,
    content: Value,
}

impl Resource {
    /// Creates a resource, stamping `resourceType` and `id` into object content.
    ///
    /// Non-object content is kept as-is; the codec rejects it at encode time.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>, content: Value) -> Self {
        let resource_type = resource_type.into();
        let id = id.into();

        let mut content = content;
        if let Some(obj) = content.as_object_mut() {
            obj.insert(
                "resourceType".to_string(),
                Value::String(resource_type.clone()),
            );
            obj.insert("id".to_string(), Value::String(id.clone()));
        }

        Self {
            resource_type,
            id,
            content,
        }
    }

    /// Builds a resource from a self-describing JSON body.
    pub fn from_json(content: Value) -> Result<Self, EncodingError> {
        let obj = content
            .as_object()
            .ok_or_else(|| EncodingError::Deserialize {
                message: "resource body must be a JSON object".to_string(),
            })?;

        let resource_type = obj
            .get("resourceType")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EncodingError::Deserialize {
                message: "resource body is missing resourceType".to_string(),
            })?
            .to_string();

        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EncodingError::Deserialize {
                message: format!("{} body is missing id", resource_type),
            })?
            .to_string();

        Ok(Self {
            resource_type,
            id,
            content,
        })
    }

    /// Returns the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the logical id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the key of this resource.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.resource_type, &self.id)
    }

    /// Returns the JSON content.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Consumes the resource and returns its JSON content.
    pub fn into_content(self) -> Value {
        self.content
    }
}
