//! Watermark store: append-only category tables

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use super::schema;
use crate::error::{Error, Result};
use crate::models::{Record, TimestampedRecord};

/// Trait for category storage operations
pub trait CategoryStore {
    /// Ensure the category table exists (idempotent)
    fn create_if_missing<R: Record>(&self) -> Result<()>;

    /// Maximum committed timestamp, or `None` for an empty table
    fn max_timestamp<R: TimestampedRecord>(&self) -> Result<Option<i64>>;

    /// Insert all rows as one batch; returns the number of rows written
    fn append<R: Record>(&self, rows: &[R]) -> Result<usize>;

    /// Distinct values of the category's key column
    fn distinct_keys<R: Record>(&self) -> Result<HashSet<String>>;

    /// Rows in insertion order
    fn select_page<R: Record>(&self, offset: usize, limit: usize) -> Result<Vec<R>>;

    /// Number of stored rows
    fn count<R: Record>(&self) -> Result<usize>;
}

/// `SQLite` implementation of `CategoryStore`
pub struct SqliteCategoryStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCategoryStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn column_list<R: Record>() -> String {
        R::COLUMNS
            .iter()
            .map(|column| column.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn insert_sql<R: Record>() -> String {
        let placeholders = vec!["?"; R::COLUMNS.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            R::table(),
            Self::column_list::<R>()
        )
    }

    /// Check every row against the declared columns before writing anything
    fn validate_batch<R: Record>(rows: &[R]) -> Result<Vec<Vec<Value>>> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let values = row.values();
                if values.len() != R::COLUMNS.len() {
                    return Err(Error::Storage(format!(
                        "{}: row {index} has {} values but the table declares {} columns",
                        R::table(),
                        values.len(),
                        R::COLUMNS.len()
                    )));
                }
                if let Some(column) = R::COLUMNS
                    .iter()
                    .zip(&values)
                    .find_map(|(column, value)| (!column.kind.accepts(value)).then_some(column))
                {
                    return Err(Error::Storage(format!(
                        "{}: row {index} has an invalid value for column {}",
                        R::table(),
                        column.name
                    )));
                }
                Ok(values)
            })
            .collect()
    }
}

impl CategoryStore for SqliteCategoryStore<'_> {
    fn create_if_missing<R: Record>(&self) -> Result<()> {
        schema::ensure_table::<R>(self.conn)
    }

    fn max_timestamp<R: TimestampedRecord>(&self) -> Result<Option<i64>> {
        let watermark = self.conn.query_row(
            &format!("SELECT MAX({}) FROM {}", R::TIMESTAMP_COLUMN, R::table()),
            [],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(watermark)
    }

    fn append<R: Record>(&self, rows: &[R]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let batch = Self::validate_batch(rows).inspect_err(|error| {
            tracing::warn!("Rejected batch for {}: {}", R::table(), error);
        })?;

        // Dropping the transaction on error rolls back every row of the batch
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&Self::insert_sql::<R>())?;
            for values in &batch {
                stmt.execute(params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;

        tracing::debug!("Appended {} rows to {}", batch.len(), R::table());
        Ok(batch.len())
    }

    fn distinct_keys<R: Record>(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT DISTINCT {} FROM {}", R::KEY, R::table()))?;

        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;

        Ok(keys)
    }

    fn select_page<R: Record>(&self, offset: usize, limit: usize) -> Result<Vec<R>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY rowid ASC LIMIT ? OFFSET ?",
            Self::column_list::<R>(),
            R::table()
        ))?;

        let rows = stmt
            .query_map(params![limit as i64, offset as i64], R::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    fn count<R: Record>(&self) -> Result<usize> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", R::table()),
            [],
            |row| row.get::<_, usize>(0),
        )?;
        Ok(count)
    }
}
