//! Index entry types.
//!
//! An index entry is a searchable projection of one field of a resource. The
//! store keeps four kinds, each in its own table. Entries do not carry their
//! owner; the owning [`ResourceKey`](super::ResourceKey) is attached when the
//! entry is written.

// Entry fields mirror the table columns they are stored in
#![allow(missing_docs)]

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The four index kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact-match text.
    String,
    /// Coded value with a coding system.
    Token,
    /// Pointer to another resource.
    Reference,
    /// Numeric magnitude with unit and system.
    Quantity,
}

impl IndexKind {
    /// All kinds, in table order.
    pub const ALL: [IndexKind; 4] = [
        IndexKind::String,
        IndexKind::Token,
        IndexKind::Reference,
        IndexKind::Quantity,
    ];

    /// Returns the lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::String => "string",
            IndexKind::Token => "token",
            IndexKind::Reference => "reference",
            IndexKind::Quantity => "quantity",
        }
    }

    /// Parses a kind from its lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" => Some(IndexKind::String),
            "token" => Some(IndexKind::Token),
            "reference" => Some(IndexKind::Reference),
            "quantity" => Some(IndexKind::Quantity),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String index entry: `(path, value)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringIndex {
    pub path: String,
    pub value: String,
}

impl StringIndex {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Token index entry: `(path, system, value)`.
///
/// An empty `system` is stored and matched literally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenIndex {
    pub path: String,
    pub system: String,
    pub value: String,
}

impl TokenIndex {
    pub fn new(
        path: impl Into<String>,
        system: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            system: system.into(),
            value: value.into(),
        }
    }
}

/// Reference index entry: `(path, value)` where value is e.g. `Patient/123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceIndex {
    pub path: String,
    pub value: String,
}

impl ReferenceIndex {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Quantity index entry: `(name, path, system, value, unit)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantityIndex {
    pub name: String,
    pub path: String,
    pub system: String,
    pub value: Decimal,
    pub unit: String,
}

impl QuantityIndex {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        system: impl Into<String>,
        value: Decimal,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            system: system.into(),
            value,
            unit: unit.into(),
        }
    }

    /// Canonical text form of the value used for exact matching.
    ///
    /// Trailing zeros are stripped so that `5.40` and `5.4` compare equal.
    pub fn canonical_value(&self) -> String {
        canonical_decimal(self.value)
    }
}

/// Canonical text form of a decimal (trailing zeros stripped, no negative zero).
pub fn canonical_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// The full set of index entries produced for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntrySet {
    pub strings: Vec<StringIndex>,
    pub tokens: Vec<TokenIndex>,
    pub references: Vec<ReferenceIndex>,
    pub quantities: Vec<QuantityIndex>,
}

impl IndexEntrySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string(mut self, entry: StringIndex) -> Self {
        self.strings.push(entry);
        self
    }

    pub fn with_token(mut self, entry: TokenIndex) -> Self {
        self.tokens.push(entry);
        self
    }

    pub fn with_reference(mut self, entry: ReferenceIndex) -> Self {
        self.references.push(entry);
        self
    }

    pub fn with_quantity(mut self, entry: QuantityIndex) -> Self {
        self.quantities.push(entry);
        self
    }

    /// Total number of entries across all kinds.
    pub fn len(&self) -> usize {
        self.strings.len() + self.tokens.len() + self.references.len() + self.quantities.len()
    }

    /// Returns true if the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exact-match criteria for one indexed lookup.
///
/// The criteria has the same shape as the entry it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndexCriteria {
    String(StringIndex),
    Token(TokenIndex),
    Reference(ReferenceIndex),
    Quantity(QuantityIndex),
}

impl IndexCriteria {
    /// Returns the index kind this criteria targets.
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexCriteria::String(_) => IndexKind::String,
            IndexCriteria::Token(_) => IndexKind::Token,
            IndexCriteria::Reference(_) => IndexKind::Reference,
            IndexCriteria::Quantity(_) => IndexKind::Quantity,
        }
    }
}

impl From<StringIndex> for IndexCriteria {
    fn from(entry: StringIndex) -> Self {
        IndexCriteria::String(entry)
    }
}

impl From<TokenIndex> for IndexCriteria {
    fn from(entry: TokenIndex) -> Self {
        IndexCriteria::Token(entry)
    }
}

impl From<ReferenceIndex> for IndexCriteria {
    fn from(entry: ReferenceIndex) -> Self {
        IndexCriteria::Reference(entry)
    }
}

impl From<QuantityIndex> for IndexCriteria {
    fn from(entry: QuantityIndex) -> Self {
        IndexCriteria::Quantity(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_canonical_decimal_strips_trailing_zeros() {
        let a = Decimal::from_str("5.40").unwrap();
        let b = Decimal::from_str("5.4").unwrap();
        assert_eq!(canonical_decimal(a), "5.4");
        assert_eq!(canonical_decimal(a), canonical_decimal(b));
        assert_eq!(canonical_decimal(Decimal::from_str("100").unwrap()), "100");
        assert_eq!(canonical_decimal(Decimal::from_str("-0.0").unwrap()), "0");
    }

    #[test]
    fn test_entry_set_len() {
        let set = IndexEntrySet::new()
            .with_string(StringIndex::new("name", "smith"))
            .with_token(TokenIndex::new("identifier", "ssn", "123-45"))
            .with_reference(ReferenceIndex::new("organization", "Organization/o1"));
        assert_eq!(set.len(), 3);
        assert!(!set.is_empty());
        assert!(IndexEntrySet::new().is_empty());
    }

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in IndexKind::ALL {
            assert_eq!(IndexKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(IndexKind::parse("date"), None);
    }

    #[test]
    fn test_criteria_kind() {
        let criteria: IndexCriteria = TokenIndex::new("code", "http://loinc.org", "1234-5").into();
        assert_eq!(criteria.kind(), IndexKind::Token);
    }
}
