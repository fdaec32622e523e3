//! Composite query types.
//!
//! A [`RawQuery`] combines index lookups over one resource type with set
//! operators. It is the escape hatch for compositions the typed lookups cannot
//! express, such as "has this identifier AND references that organization".
//! Queries are read-only and are compiled by the backend, never passed through
//! as SQL text.
//!
//! # Example
//!
//! ```
//! use helios_resource_store::types::{Predicate, RawQuery, ReferenceIndex, TokenIndex};
//!
//! let query = RawQuery::new(
//!     "Patient",
//!     Predicate::and(vec![
//!         Predicate::matches(TokenIndex::new("identifier", "ssn", "123-45")),
//!         Predicate::matches(ReferenceIndex::new("organization", "Organization/o1")),
//!     ]),
//! )
//! .with_limit(10);
//!
//! assert_eq!(query.limit, Some(10));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::index::IndexCriteria;

/// A node in a composite query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Resources with an index entry exactly matching the criteria.
    Match {
        /// The criteria to match.
        criteria: IndexCriteria,
    },

    /// Resources with a quantity entry whose value lies within inclusive bounds.
    ///
    /// Bounds are compared on the stored numeric magnitude; `None` leaves a
    /// side open.
    QuantityRange {
        /// Quantity name.
        name: String,
        /// Quantity path.
        path: String,
        /// Unit system, matched exactly.
        system: String,
        /// Unit, matched exactly.
        unit: String,
        /// Inclusive lower bound.
        low: Option<Decimal>,
        /// Inclusive upper bound.
        high: Option<Decimal>,
    },

    /// Every stored resource of the query's type.
    All,

    /// Intersection of the operands.
    And {
        /// Operands.
        operands: Vec<Predicate>,
    },

    /// Union of the operands.
    Or {
        /// Operands.
        operands: Vec<Predicate>,
    },

    /// Every resource of the type that does not match the operand.
    Not {
        /// Excluded set.
        operand: Box<Predicate>,
    },
}

impl Predicate {
    /// Creates a match predicate.
    pub fn matches(criteria: impl Into<IndexCriteria>) -> Self {
        Predicate::Match {
            criteria: criteria.into(),
        }
    }

    /// Creates an intersection.
    pub fn and(operands: Vec<Predicate>) -> Self {
        Predicate::And { operands }
    }

    /// Creates a union.
    pub fn or(operands: Vec<Predicate>) -> Self {
        Predicate::Or { operands }
    }

    /// Creates a complement.
    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Predicate) -> Self {
        Predicate::Not {
            operand: Box::new(operand),
        }
    }

    /// Creates a quantity range predicate.
    pub fn quantity_range(
        name: impl Into<String>,
        path: impl Into<String>,
        system: impl Into<String>,
        unit: impl Into<String>,
        low: Option<Decimal>,
        high: Option<Decimal>,
    ) -> Self {
        Predicate::QuantityRange {
            name: name.into(),
            path: path.into(),
            system: system.into(),
            unit: unit.into(),
            low,
            high,
        }
    }

    /// Returns the nesting depth of this predicate (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        match self {
            Predicate::Match { .. } | Predicate::QuantityRange { .. } | Predicate::All => 1,
            Predicate::And { operands } | Predicate::Or { operands } => {
                1 + operands.iter().map(Predicate::depth).max().unwrap_or(0)
            }
            Predicate::Not { operand } => 1 + operand.depth(),
        }
    }
}

/// A read-only composite query over one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuery {
    /// The resource type to query.
    pub resource_type: String,
    /// The predicate tree.
    pub predicate: Predicate,
    /// Maximum number of results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl RawQuery {
    /// Creates a query without a limit.
    pub fn new(resource_type: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            resource_type: resource_type.into(),
            predicate,
            limit: None,
        }
    }

    /// Caps the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
