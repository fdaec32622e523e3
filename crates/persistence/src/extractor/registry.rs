//! Index definition registry.
//!
//! Holds the index definitions the [`PathIndexExtractor`](super::PathIndexExtractor)
//! evaluates, keyed by resource type and index name. Definitions can be
//! registered programmatically, loaded from JSON, or taken from the built-in
//! default set for common clinical resources.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::IndexKind;

/// Errors raised by the registry.
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An index with the same name already exists for the resource type.
    #[error("duplicate index definition: {resource_type}.{name}")]
    Duplicate { resource_type: String, name: String },

    /// A definition has an empty field.
    #[error("invalid index definition: {message}")]
    Invalid { message: String },

    /// JSON definitions could not be parsed.
    #[error("failed to parse index definitions: {message}")]
    Parse { message: String },
}

/// Declares one index for one resource type.
///
/// `name` becomes the path of every entry the definition produces, and also
/// the name of quantity entries; `expression` is a dotted path into the JSON
/// body (the leading resource type segment is optional).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Resource type the index applies to.
    pub resource_type: String,
    /// Index name used in lookups.
    pub name: String,
    /// Dotted path, e.g. `Patient.identifier`.
    pub expression: String,
    /// Kind of entry produced.
    pub kind: IndexKind,
}

impl IndexDefinition {
    /// Creates a definition.
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        expression: impl Into<String>,
        kind: IndexKind,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            expression: expression.into(),
            kind,
        }
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.resource_type.is_empty() || self.name.is_empty() || self.expression.is_empty() {
            return Err(RegistryError::Invalid {
                message: format!(
                    "resource_type, name and expression are required (got {:?})",
                    self
                ),
            });
        }
        Ok(())
    }
}

/// In-memory registry of index definitions.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    by_type: HashMap<String, Vec<Arc<IndexDefinition>>>,
}

impl IndexRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in definitions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for def in default_definitions() {
            // Defaults are unique by construction.
            let _ = registry.register(def);
        }
        registry
    }

    /// Parses a JSON array of definitions into a new registry.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let defs: Vec<IndexDefinition> =
            serde_json::from_str(json).map_err(|e| RegistryError::Parse {
                message: e.to_string(),
            })?;

        let mut registry = Self::new();
        for def in defs {
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// Registers a definition.
    pub fn register(&mut self, def: IndexDefinition) -> Result<(), RegistryError> {
        def.validate()?;

        let defs = self.by_type.entry(def.resource_type.clone()).or_default();
        if defs.iter().any(|d| d.name == def.name) {
            return Err(RegistryError::Duplicate {
                resource_type: def.resource_type,
                name: def.name,
            });
        }
        defs.push(Arc::new(def));
        Ok(())
    }

    /// Removes a definition, returning it if present.
    pub fn unregister(&mut self, resource_type: &str, name: &str) -> Option<Arc<IndexDefinition>> {
        let defs = self.by_type.get_mut(resource_type)?;
        let pos = defs.iter().position(|d| d.name == name)?;
        Some(defs.remove(pos))
    }

    /// Returns the definitions that apply to a resource type.
    pub fn definitions_for(&self, resource_type: &str) -> Vec<Arc<IndexDefinition>> {
        self.by_type.get(resource_type).cloned().unwrap_or_default()
    }

    /// Returns the resource types with at least one definition.
    pub fn resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .by_type
            .iter()
            .filter(|(_, defs)| !defs.is_empty())
            .map(|(t, _)| t.clone())
            .collect();
        types.sort();
        types
    }

    /// Total number of definitions.
    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    /// Returns true if no definitions are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn default_definitions() -> Vec<IndexDefinition> {
    use IndexKind::*;

    vec![
        IndexDefinition::new("Patient", "identifier", "Patient.identifier", Token),
        IndexDefinition::new("Patient", "name", "Patient.name", String),
        IndexDefinition::new("Patient", "gender", "Patient.gender", Token),
        IndexDefinition::new("Patient", "birthdate", "Patient.birthDate", String),
        IndexDefinition::new(
            "Patient",
            "organization",
            "Patient.managingOrganization",
            Reference,
        ),
        IndexDefinition::new(
            "Patient",
            "general-practitioner",
            "Patient.generalPractitioner",
            Reference,
        ),
        IndexDefinition::new("Practitioner", "identifier", "Practitioner.identifier", Token),
        IndexDefinition::new("Practitioner", "name", "Practitioner.name", String),
        IndexDefinition::new("Organization", "identifier", "Organization.identifier", Token),
        IndexDefinition::new("Organization", "name", "Organization.name", String),
        IndexDefinition::new("Observation", "code", "Observation.code", Token),
        IndexDefinition::new("Observation", "status", "Observation.status", Token),
        IndexDefinition::new("Observation", "subject", "Observation.subject", Reference),
        IndexDefinition::new("Observation", "encounter", "Observation.encounter", Reference),
        IndexDefinition::new(
            "Observation",
            "value-quantity",
            "Observation.valueQuantity",
            Quantity,
        ),
        IndexDefinition::new("Encounter", "status", "Encounter.status", Token),
        IndexDefinition::new("Encounter", "subject", "Encounter.subject", Reference),
        IndexDefinition::new(
            "QuestionnaireResponse",
            "questionnaire",
            "QuestionnaireResponse.questionnaire",
            Reference,
        ),
        IndexDefinition::new(
            "QuestionnaireResponse",
            "subject",
            "QuestionnaireResponse.subject",
            Reference,
        ),
        IndexDefinition::new(
            "QuestionnaireResponse",
            "status",
            "QuestionnaireResponse.status",
            Token,
        ),
    ]
}
