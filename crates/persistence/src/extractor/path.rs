//! Path-based index extraction.
//!
//! Evaluates each registered [`IndexDefinition`] as a dotted path over the
//! resource JSON and converts the values it reaches into entries of the
//! definition's kind. Arrays are flattened at every step.

use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::types::{
    IndexEntrySet, IndexKind, QuantityIndex, ReferenceIndex, Resource, StringIndex, TokenIndex,
};

use super::IndexExtractor;
use super::registry::{IndexDefinition, IndexRegistry};

/// Text members collected from complex string-indexed values (HumanName, Address).
const TEXT_MEMBERS: &[&str] = &[
    "text",
    "family",
    "given",
    "prefix",
    "suffix",
    "line",
    "city",
    "district",
    "state",
    "postalCode",
    "country",
];

/// Extracts index entries by evaluating registry definitions as JSON paths.
///
/// The registry is shared behind a lock so definitions can be added while the
/// store is running; a subsequent reindex applies them to existing resources.
#[derive(Debug, Clone)]
pub struct PathIndexExtractor {
    registry: Arc<RwLock<IndexRegistry>>,
}

impl PathIndexExtractor {
    /// Creates an extractor over a shared registry.
    pub fn new(registry: Arc<RwLock<IndexRegistry>>) -> Self {
        Self { registry }
    }

    /// Creates an extractor over the built-in definitions.
    pub fn with_defaults() -> Self {
        Self::from_registry(IndexRegistry::with_defaults())
    }

    /// Creates an extractor that owns `registry`.
    pub fn from_registry(registry: IndexRegistry) -> Self {
        Self::new(Arc::new(RwLock::new(registry)))
    }

    /// Returns the shared registry.
    pub fn registry(&self) -> &Arc<RwLock<IndexRegistry>> {
        &self.registry
    }

    fn extract_definition(&self, content: &Value, def: &IndexDefinition, out: &mut IndexEntrySet) {
        let segments = parse_path(&def.expression, &def.resource_type);
        let mut values = Vec::new();
        navigate(content, &segments, &mut values);

        for value in values {
            let before = out.len();
            match def.kind {
                IndexKind::String => to_strings(value, &def.name, out),
                IndexKind::Token => to_tokens(value, &def.name, out),
                IndexKind::Reference => to_references(value, &def.name, out),
                IndexKind::Quantity => to_quantities(value, def, out),
            }
            if out.len() == before {
                tracing::warn!(
                    "Skipping unconvertible value for index '{}.{}' ({})",
                    def.resource_type,
                    def.name,
                    def.kind
                );
            }
        }
    }
}

impl Default for PathIndexExtractor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl IndexExtractor for PathIndexExtractor {
    fn extract(&self, resource: &Resource) -> IndexEntrySet {
        let defs = {
            let registry = self.registry.read();
            registry.definitions_for(resource.resource_type())
        };

        let mut set = IndexEntrySet::new();
        for def in &defs {
            self.extract_definition(resource.content(), def, &mut set);
        }

        tracing::trace!(
            "Extracted {} index entries for {}",
            set.len(),
            resource.key()
        );
        set
    }
}

/// Splits an expression into member names, dropping a leading type segment.
fn parse_path<'a>(expression: &'a str, resource_type: &str) -> Vec<&'a str> {
    let mut segments: Vec<&str> = expression.split('.').filter(|s| !s.is_empty()).collect();
    if segments.len() > 1 && (segments[0] == resource_type || segments[0] == "Resource") {
        segments.remove(0);
    }
    segments
}

fn navigate<'v>(value: &'v Value, segments: &[&str], out: &mut Vec<&'v Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                navigate(item, segments, out);
            }
        }
        _ if segments.is_empty() => {
            if !value.is_null() {
                out.push(value);
            }
        }
        Value::Object(obj) => {
            if let Some(child) = member(obj, segments[0]) {
                navigate(child, &segments[1..], out);
            }
        }
        _ => {}
    }
}

/// Looks up a member, falling back to a unique choice-type member
/// (`value` resolves to `valueQuantity` when that is the only candidate).
fn member<'v>(obj: &'v Map<String, Value>, name: &str) -> Option<&'v Value> {
    if let Some(child) = obj.get(name) {
        return Some(child);
    }
    let mut candidates = obj.iter().filter(|(k, _)| {
        k.starts_with(name)
            && k[name.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase())
    });
    match (candidates.next(), candidates.next()) {
        (Some((_, child)), None) => Some(child),
        _ => None,
    }
}

fn to_strings(value: &Value, path: &str, out: &mut IndexEntrySet) {
    match value {
        Value::String(s) => out.strings.push(StringIndex::new(path, s.as_str())),
        Value::Object(obj) => {
            for key in TEXT_MEMBERS {
                match obj.get(*key) {
                    Some(Value::String(s)) => out.strings.push(StringIndex::new(path, s.as_str())),
                    Some(Value::Array(items)) => {
                        for s in items.iter().filter_map(Value::as_str) {
                            out.strings.push(StringIndex::new(path, s));
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn to_tokens(value: &Value, path: &str, out: &mut IndexEntrySet) {
    match value {
        Value::String(s) => out.tokens.push(TokenIndex::new(path, "", s.as_str())),
        Value::Bool(b) => out.tokens.push(TokenIndex::new(path, "", b.to_string())),
        Value::Object(obj) => {
            let system = obj.get("system").and_then(Value::as_str).unwrap_or_default();

            // CodeableConcept
            if let Some(codings) = obj.get("coding").and_then(Value::as_array) {
                for coding in codings {
                    if let Some(code) = coding.get("code").and_then(Value::as_str) {
                        let system = coding
                            .get("system")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        out.tokens.push(TokenIndex::new(path, system, code));
                    }
                }
                return;
            }

            // Coding
            if let Some(code) = obj.get("code").and_then(Value::as_str) {
                out.tokens.push(TokenIndex::new(path, system, code));
                return;
            }

            // Identifier, ContactPoint
            if let Some(v) = obj.get("value").and_then(Value::as_str)
                && !v.is_empty()
            {
                out.tokens.push(TokenIndex::new(path, system, v));
            }
        }
        _ => {}
    }
}

fn to_references(value: &Value, path: &str, out: &mut IndexEntrySet) {
    let reference = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj.get("reference").and_then(Value::as_str),
        _ => None,
    };
    if let Some(r) = reference.filter(|r| !r.is_empty()) {
        out.references.push(ReferenceIndex::new(path, r));
    }
}

fn to_quantities(value: &Value, def: &IndexDefinition, out: &mut IndexEntrySet) {
    let Value::Object(obj) = value else {
        return;
    };
    let Some(number) = obj.get("value").and_then(decimal_of) else {
        return;
    };

    let system = obj.get("system").and_then(Value::as_str).unwrap_or_default();
    let unit = obj
        .get("unit")
        .or_else(|| obj.get("code"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    out.quantities.push(QuantityIndex::new(
        def.name.as_str(),
        def.name.as_str(),
        system,
        number,
        unit,
    ));
}

fn decimal_of(value: &Value) -> Option<Decimal> {
    let Value::Number(n) = value else {
        return None;
    };
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extractor() -> PathIndexExtractor {
        PathIndexExtractor::with_defaults()
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("Patient.name", "Patient"), vec!["name"]);
        assert_eq!(parse_path("name.given", "Patient"), vec!["name", "given"]);
        assert_eq!(parse_path("Resource.meta", "Patient"), vec!["meta"]);
    }

    #[test]
    fn test_extract_patient() {
        let patient = Resource::new(
            "Patient",
            "p1",
            json!({
                "identifier": [{"system": "ssn", "value": "123-45"}],
                "name": [{"family": "Smith", "given": ["Jane", "Q"]}],
                "gender": "female",
                "managingOrganization": {"reference": "Organization/o1"}
            }),
        );

        let set = extractor().extract(&patient);

        assert!(set.tokens.contains(&TokenIndex::new("identifier", "ssn", "123-45")));
        assert!(set.tokens.contains(&TokenIndex::new("gender", "", "female")));
        assert!(
            set.references
                .contains(&ReferenceIndex::new("organization", "Organization/o1"))
        );
        assert!(set.strings.contains(&StringIndex::new("name", "Smith")));
        assert!(set.strings.contains(&StringIndex::new("name", "Jane")));
        assert!(set.strings.contains(&StringIndex::new("name", "Q")));
    }

    #[test]
    fn test_extract_codeable_concept() {
        let obs = Resource::new(
            "Observation",
            "o1",
            json!({
                "code": {"coding": [
                    {"system": "http://loinc.org", "code": "29463-7"},
                    {"system": "http://snomed.info/sct", "code": "27113001"}
                ]},
                "subject": {"reference": "Patient/p1"}
            }),
        );

        let set = extractor().extract(&obs);
        assert_eq!(set.tokens.len(), 2);
        assert!(set.references.contains(&ReferenceIndex::new("subject", "Patient/p1")));
    }

    #[test]
    fn test_extract_quantity() {
        let obs = Resource::new(
            "Observation",
            "o1",
            json!({
                "valueQuantity": {
                    "value": 72.50,
                    "unit": "kg",
                    "system": "http://unitsofmeasure.org",
                    "code": "kg"
                }
            }),
        );

        let set = extractor().extract(&obs);
        assert_eq!(set.quantities.len(), 1);

        let q = &set.quantities[0];
        assert_eq!(q.name, "value-quantity");
        assert_eq!(q.path, "value-quantity");
        assert_eq!(q.system, "http://unitsofmeasure.org");
        assert_eq!(q.unit, "kg");
        assert_eq!(q.canonical_value(), "72.5");
    }

    #[test]
    fn test_choice_member_fallback() {
        let mut registry = IndexRegistry::new();
        registry
            .register(IndexDefinition::new(
                "Observation",
                "value",
                "Observation.value",
                IndexKind::Quantity,
            ))
            .unwrap();
        let extractor = PathIndexExtractor::from_registry(registry);

        let obs = Resource::new(
            "Observation",
            "o1",
            json!({"valueQuantity": {"value": 5, "code": "mg"}}),
        );
        let set = extractor.extract(&obs);
        assert_eq!(set.quantities.len(), 1);
        assert_eq!(set.quantities[0].unit, "mg");
    }

    #[test]
    fn test_unconvertible_values_skipped() {
        let patient = Resource::new(
            "Patient",
            "p1",
            json!({
                "identifier": [42, {"system": "ssn", "value": "9"}],
                "managingOrganization": {"display": "no reference"}
            }),
        );

        let set = extractor().extract(&patient);
        assert_eq!(set.tokens, vec![TokenIndex::new("identifier", "ssn", "9")]);
        assert!(set.references.is_empty());
    }

    #[test]
    fn test_unknown_type_yields_nothing() {
        let r = Resource::new("Basic", "b1", json!({"code": "x"}));
        assert!(extractor().extract(&r).is_empty());
    }

    #[test]
    fn test_registry_updates_are_visible() {
        let extractor = PathIndexExtractor::from_registry(IndexRegistry::new());
        let r = Resource::new("Basic", "b1", json!({"code": "x"}));
        assert!(extractor.extract(&r).is_empty());

        extractor
            .registry()
            .write()
            .register(IndexDefinition::new("Basic", "code", "code", IndexKind::Token))
            .unwrap();
        assert_eq!(extractor.extract(&r).tokens.len(), 1);
    }
}
