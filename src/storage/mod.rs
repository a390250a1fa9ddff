//! Relational backing store.
//!
//! [`Storage`] is the seam between entities and whatever relational engine
//! holds the rows. [`MemoryStorage`] is the bundled in-process engine.

pub mod bulk;
pub mod filter;
pub mod memory;
pub mod pattern;
pub mod query;
pub mod sql;

pub use bulk::BulkWriter;
pub use memory::MemoryStorage;
pub use query::{COUNT_COLUMN, Limit, Predicate, Selection, WriteMode};

use crate::core::{EntityId, FieldMap, Result, Row, Value};

/// Parameterized reads and writes against a relational backend.
///
/// Calls are synchronous and may block the calling unit of work. A transport
/// failure is reported as [`BackendError`](crate::BackendError), never retried.
pub trait Storage: Send + Sync {
    fn select(
        &self,
        table: &str,
        selection: &Selection,
        predicate: &Predicate,
        order: Option<&str>,
        limit: Option<Limit>,
    ) -> Result<Vec<Row>>;

    /// Inserts one row and returns the primary key the backend assigned.
    fn insert(&self, table: &str, fields: &FieldMap) -> Result<EntityId>;

    /// Inserts the row, overwriting any existing row with the same primary key.
    fn replace(&self, table: &str, fields: &FieldMap) -> Result<EntityId>;

    /// Returns the number of affected rows.
    fn update(&self, table: &str, fields: &FieldMap, predicate: &Predicate) -> Result<u64>;

    /// Returns the number of deleted rows.
    fn delete(&self, table: &str, predicate: &Predicate, limit: Option<u64>) -> Result<u64>;

    /// Writes many rows sharing one column list.
    fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
        mode: WriteMode,
    ) -> Result<u64> {
        let mut written = 0;
        for values in rows {
            let fields: FieldMap = columns.iter().cloned().zip(values.iter().cloned()).collect();
            match mode {
                WriteMode::Insert => self.insert(table, &fields)?,
                WriteMode::Replace => self.replace(table, &fields)?,
            };
            written += 1;
        }
        Ok(written)
    }

    /// Number of rows matching `predicate`.
    fn count(&self, table: &str, predicate: &Predicate) -> Result<u64> {
        let rows = self.select(table, &Selection::Count, predicate, None, None)?;
        Ok(rows
            .first()
            .and_then(|row| row.get(COUNT_COLUMN))
            .and_then(Value::as_i64)
            .unwrap_or(0)
            .max(0) as u64)
    }
}
