//! The four index tables.
//!
//! Each table stores many rows per resource, keyed back to the owner by
//! `(resource_type, resource_id)`. Every table answers exact-match lookups on
//! its full entry shape; the composite query compiler reuses the same match
//! fragments.

use std::collections::BTreeSet;
use std::str::FromStr;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Row, params, params_from_iter};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::StorageResult;
use crate::types::{
    IndexEntrySet, QuantityIndex, ReferenceIndex, ResourceKey, StringIndex, TokenIndex,
    canonical_decimal,
};

/// Common operations over one index table.
pub(crate) trait IndexTable {
    /// The entry type stored in the table.
    type Entry;

    /// Table name.
    const TABLE: &'static str;

    /// Columns compared by an exact-match lookup, in parameter order.
    const MATCH_COLUMNS: &'static [&'static str];

    /// Inserts one entry owned by `key`.
    fn insert(conn: &Connection, key: &ResourceKey, entry: &Self::Entry) -> StorageResult<()>;

    /// Values bound to [`MATCH_COLUMNS`](Self::MATCH_COLUMNS).
    fn match_params(entry: &Self::Entry) -> Vec<SqlValue>;

    /// Reads one row of the owner's entries.
    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Self::Entry>;

    /// Column list selected by [`entries_for_resource`](Self::entries_for_resource).
    fn entry_columns() -> String {
        Self::MATCH_COLUMNS.join(", ")
    }

    /// `SELECT resource_type, resource_id` over rows matching an entry.
    ///
    /// The first parameter is the resource type, followed by
    /// [`match_params`](Self::match_params).
    fn match_sql() -> String {
        let mut sql = format!(
            "SELECT resource_type, resource_id FROM {} WHERE resource_type = ?",
            Self::TABLE
        );
        for column in Self::MATCH_COLUMNS {
            sql.push_str(" AND ");
            sql.push_str(column);
            sql.push_str(" = ?");
        }
        sql
    }

    /// Returns the distinct owners of rows exactly matching `entry`.
    fn lookup(
        conn: &Connection,
        resource_type: &str,
        entry: &Self::Entry,
    ) -> StorageResult<Vec<ResourceKey>> {
        let mut params = vec![SqlValue::Text(resource_type.to_string())];
        params.extend(Self::match_params(entry));

        let mut stmt = conn.prepare(&Self::match_sql())?;
        let keys = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok(ResourceKey::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })?
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(keys.into_iter().collect())
    }

    /// Deletes every row owned by `key`, returning the number removed.
    fn delete_all_for_resource(conn: &Connection, key: &ResourceKey) -> StorageResult<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE resource_type = ?1 AND resource_id = ?2",
            Self::TABLE
        );
        Ok(conn.execute(&sql, params![key.resource_type, key.id])?)
    }

    /// Reads back the entries owned by `key`.
    fn entries_for_resource(
        conn: &Connection,
        key: &ResourceKey,
    ) -> StorageResult<Vec<Self::Entry>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE resource_type = ?1 AND resource_id = ?2 ORDER BY rowid",
            Self::entry_columns(),
            Self::TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![key.resource_type, key.id], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

pub(crate) struct StringIndexTable;

impl IndexTable for StringIndexTable {
    type Entry = StringIndex;
    const TABLE: &'static str = "string_index";
    const MATCH_COLUMNS: &'static [&'static str] = &["path", "value"];

    fn insert(conn: &Connection, key: &ResourceKey, entry: &StringIndex) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO string_index (resource_type, resource_id, path, value)
             VALUES (?1, ?2, ?3, ?4)",
            params![key.resource_type, key.id, entry.path, entry.value],
        )?;
        Ok(())
    }

    fn match_params(entry: &StringIndex) -> Vec<SqlValue> {
        vec![text(&entry.path), text(&entry.value)]
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<StringIndex> {
        Ok(StringIndex::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    }
}

pub(crate) struct TokenIndexTable;

impl IndexTable for TokenIndexTable {
    type Entry = TokenIndex;
    const TABLE: &'static str = "token_index";
    const MATCH_COLUMNS: &'static [&'static str] = &["path", "system", "value"];

    fn insert(conn: &Connection, key: &ResourceKey, entry: &TokenIndex) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO token_index (resource_type, resource_id, path, system, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key.resource_type, key.id, entry.path, entry.system, entry.value],
        )?;
        Ok(())
    }

    fn match_params(entry: &TokenIndex) -> Vec<SqlValue> {
        vec![text(&entry.path), text(&entry.system), text(&entry.value)]
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<TokenIndex> {
        Ok(TokenIndex::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    }
}

pub(crate) struct ReferenceIndexTable;

impl IndexTable for ReferenceIndexTable {
    type Entry = ReferenceIndex;
    const TABLE: &'static str = "reference_index";
    const MATCH_COLUMNS: &'static [&'static str] = &["path", "value"];

    fn insert(conn: &Connection, key: &ResourceKey, entry: &ReferenceIndex) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO reference_index (resource_type, resource_id, path, value)
             VALUES (?1, ?2, ?3, ?4)",
            params![key.resource_type, key.id, entry.path, entry.value],
        )?;
        Ok(())
    }

    fn match_params(entry: &ReferenceIndex) -> Vec<SqlValue> {
        vec![text(&entry.path), text(&entry.value)]
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ReferenceIndex> {
        Ok(ReferenceIndex::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
        ))
    }
}

/// Quantity rows keep the value twice: canonical decimal text for exact
/// matching and a REAL copy for range predicates.
pub(crate) struct QuantityIndexTable;

impl IndexTable for QuantityIndexTable {
    type Entry = QuantityIndex;
    const TABLE: &'static str = "quantity_index";
    const MATCH_COLUMNS: &'static [&'static str] =
        &["name", "path", "system", "value_text", "unit"];

    fn insert(conn: &Connection, key: &ResourceKey, entry: &QuantityIndex) -> StorageResult<()> {
        conn.execute(
            "INSERT INTO quantity_index
                 (resource_type, resource_id, name, path, system, value_text, value_number, unit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                key.resource_type,
                key.id,
                entry.name,
                entry.path,
                entry.system,
                entry.canonical_value(),
                entry.value.to_f64(),
                entry.unit
            ],
        )?;
        Ok(())
    }

    fn match_params(entry: &QuantityIndex) -> Vec<SqlValue> {
        vec![
            text(&entry.name),
            text(&entry.path),
            text(&entry.system),
            SqlValue::Text(canonical_decimal(entry.value)),
            text(&entry.unit),
        ]
    }

    fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<QuantityIndex> {
        let value_text: String = row.get(3)?;
        let value = Decimal::from_str(&value_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(QuantityIndex::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            value,
            row.get::<_, String>(4)?,
        ))
    }
}

fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

/// Deletes the rows of `key` from all four tables.
pub(crate) fn delete_all(conn: &Connection, key: &ResourceKey) -> StorageResult<usize> {
    Ok(StringIndexTable::delete_all_for_resource(conn, key)?
        + TokenIndexTable::delete_all_for_resource(conn, key)?
        + ReferenceIndexTable::delete_all_for_resource(conn, key)?
        + QuantityIndexTable::delete_all_for_resource(conn, key)?)
}

/// Inserts every entry of `entries` for `key`, returning the number of rows.
pub(crate) fn insert_all(
    conn: &Connection,
    key: &ResourceKey,
    entries: &IndexEntrySet,
) -> StorageResult<usize> {
    for entry in &entries.strings {
        StringIndexTable::insert(conn, key, entry)?;
    }
    for entry in &entries.tokens {
        TokenIndexTable::insert(conn, key, entry)?;
    }
    for entry in &entries.references {
        ReferenceIndexTable::insert(conn, key, entry)?;
    }
    for entry in &entries.quantities {
        QuantityIndexTable::insert(conn, key, entry)?;
    }
    Ok(entries.len())
}

/// Reads back every entry owned by `key`.
pub(crate) fn read_all(conn: &Connection, key: &ResourceKey) -> StorageResult<IndexEntrySet> {
    Ok(IndexEntrySet {
        strings: StringIndexTable::entries_for_resource(conn, key)?,
        tokens: TokenIndexTable::entries_for_resource(conn, key)?,
        references: ReferenceIndexTable::entries_for_resource(conn, key)?,
        quantities: QuantityIndexTable::entries_for_resource(conn, key)?,
    })
}
