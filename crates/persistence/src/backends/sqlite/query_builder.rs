//! Composite query compiler.
//!
//! Turns a [`RawQuery`] into one parameterised SELECT. Every predicate node
//! compiles to a `(resource_type, resource_id)` key set restricted to the
//! query's resource type; `And`, `Or` and `Not` become `INTERSECT`, `UNION`
//! and `EXCEPT`. The final key set is joined against `resources` so only
//! stored resources are returned.

use rusqlite::types::Value as SqlValue;
use rust_decimal::prelude::ToPrimitive;

use crate::error::QueryError;
use crate::types::{IndexCriteria, Predicate, RawQuery};

use super::index_tables::{
    IndexTable, QuantityIndexTable, ReferenceIndexTable, StringIndexTable, TokenIndexTable,
};

/// Maximum predicate nesting accepted by the compiler.
pub const MAX_PREDICATE_DEPTH: usize = 32;

/// SQLite's default `SQLITE_MAX_COMPOUND_SELECT`. Wider `And`/`Or` nodes are
/// split into nested chunks of at most this many terms.
const MAX_COMPOUND_TERMS: usize = 500;

/// A compiled query: SQL text with positional `?` parameters.
#[derive(Debug, Clone)]
pub(crate) struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Compiles a query selecting `resource_type, id` ordered by id.
pub(crate) fn compile(query: &RawQuery) -> Result<CompiledQuery, QueryError> {
    if query.predicate.depth() > MAX_PREDICATE_DEPTH {
        return Err(QueryError::TooDeep {
            max_depth: MAX_PREDICATE_DEPTH,
        });
    }

    let mut builder = QueryBuilder {
        resource_type: &query.resource_type,
        params: Vec::new(),
    };
    let keys = builder.key_set(&query.predicate)?;

    let mut sql = format!(
        "SELECT DISTINCT r.resource_type, r.id FROM resources r \
         JOIN ({}) k ON k.resource_type = r.resource_type AND k.resource_id = r.id \
         WHERE r.resource_type = ? ORDER BY r.id",
        keys
    );
    builder.bind_type();

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        builder
            .params
            .push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    Ok(CompiledQuery {
        sql,
        params: builder.params,
    })
}

struct QueryBuilder<'a> {
    resource_type: &'a str,
    params: Vec<SqlValue>,
}

impl QueryBuilder<'_> {
    fn bind_type(&mut self) {
        self.params
            .push(SqlValue::Text(self.resource_type.to_string()));
    }

    fn key_set(&mut self, predicate: &Predicate) -> Result<String, QueryError> {
        match predicate {
            Predicate::Match { criteria } => Ok(self.matches(criteria)),

            Predicate::QuantityRange {
                name,
                path,
                system,
                unit,
                low,
                high,
            } => {
                if let (Some(low), Some(high)) = (low, high)
                    && low > high
                {
                    return Err(QueryError::InvalidRange {
                        name: name.clone(),
                        low: low.to_string(),
                        high: high.to_string(),
                    });
                }

                let mut sql = String::from(
                    "SELECT resource_type, resource_id FROM quantity_index \
                     WHERE resource_type = ? AND name = ? AND path = ? AND system = ? AND unit = ?",
                );
                self.bind_type();
                for value in [name, path, system, unit] {
                    self.params.push(SqlValue::Text(value.clone()));
                }
                if let Some(low) = low {
                    sql.push_str(" AND value_number >= ?");
                    self.params.push(real(low));
                }
                if let Some(high) = high {
                    sql.push_str(" AND value_number <= ?");
                    self.params.push(real(high));
                }
                Ok(sql)
            }

            Predicate::All => {
                self.bind_type();
                Ok(all_keys())
            }

            Predicate::And { operands } => self.compound(operands, "INTERSECT", "and"),

            Predicate::Or { operands } => self.compound(operands, "UNION", "or"),

            Predicate::Not { operand } => {
                self.bind_type();
                let inner = self.key_set(operand)?;
                Ok(format!("{} EXCEPT {}", all_keys(), wrap(&inner)))
            }
        }
    }

    fn compound(
        &mut self,
        operands: &[Predicate],
        operator: &str,
        name: &'static str,
    ) -> Result<String, QueryError> {
        if operands.is_empty() {
            return Err(QueryError::EmptyOperands { operator: name });
        }
        if operands.len() == 1 {
            return self.key_set(&operands[0]);
        }

        let parts = operands
            .iter()
            .map(|op| self.key_set(op).map(|sql| wrap(&sql)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(join_terms(parts, operator))
    }

    fn matches(&mut self, criteria: &IndexCriteria) -> String {
        self.bind_type();
        match criteria {
            IndexCriteria::String(entry) => {
                self.params.extend(StringIndexTable::match_params(entry));
                StringIndexTable::match_sql()
            }
            IndexCriteria::Token(entry) => {
                self.params.extend(TokenIndexTable::match_params(entry));
                TokenIndexTable::match_sql()
            }
            IndexCriteria::Reference(entry) => {
                self.params.extend(ReferenceIndexTable::match_params(entry));
                ReferenceIndexTable::match_sql()
            }
            IndexCriteria::Quantity(entry) => {
                self.params.extend(QuantityIndexTable::match_params(entry));
                QuantityIndexTable::match_sql()
            }
        }
    }
}

/// Joins compound terms, nesting chunks so no single compound SELECT exceeds
/// [`MAX_COMPOUND_TERMS`]. Term order, and so parameter order, is preserved.
fn join_terms(parts: Vec<String>, operator: &str) -> String {
    let separator = format!(" {} ", operator);
    if parts.len() <= MAX_COMPOUND_TERMS {
        return parts.join(&separator);
    }

    let chunks = parts
        .chunks(MAX_COMPOUND_TERMS)
        .map(|chunk| wrap(&chunk.join(&separator)))
        .collect();
    join_terms(chunks, operator)
}

fn all_keys() -> String {
    "SELECT resource_type, id AS resource_id FROM resources WHERE resource_type = ?".to_string()
}

/// SQLite does not accept parenthesised compound operands, so each operand is
/// selected from a subquery.
fn wrap(sql: &str) -> String {
    format!("SELECT resource_type, resource_id FROM ({})", sql)
}

fn real(value: &rust_decimal::Decimal) -> SqlValue {
    value.to_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null)
}
