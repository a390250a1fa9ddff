use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::trace;

use crate::core::{EntityId, FieldMap, ModelError, Result, Row, Value};

use super::filter::{self, Filter};
use super::{COUNT_COLUMN, Limit, Predicate, Selection, Storage, sql};

#[derive(Debug)]
struct MemTable {
    primary_key: String,
    rows: BTreeMap<EntityId, Row>,
    next_id: EntityId,
}

impl MemTable {
    fn new(primary_key: &str) -> Self {
        Self {
            primary_key: primary_key.to_string(),
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Resolves the key a new row will be stored under.
    fn key_for(&self, fields: &FieldMap) -> Result<Option<EntityId>> {
        match fields.get(&self.primary_key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| {
                ModelError::TypeMismatch(format!(
                    "Primary key '{}' must be an integer, got {}",
                    self.primary_key,
                    value.type_name()
                ))
            }),
        }
    }

    fn store(&mut self, id: EntityId, fields: &FieldMap) -> EntityId {
        let mut row = fields.clone();
        row.insert(self.primary_key.clone(), Value::Integer(id));
        self.rows.insert(id, row);
        if id >= self.next_id {
            self.next_id = id + 1;
        }
        id
    }

    fn matching_ids(&self, predicate: &Predicate) -> Result<Vec<EntityId>> {
        let matcher = RowMatcher::new(predicate)?;
        let mut ids = Vec::new();
        for (id, row) in &self.rows {
            if matcher.matches(row)? {
                ids.push(*id);
            }
        }
        Ok(ids)
    }
}

enum RowMatcher<'a> {
    All,
    Fields(&'a FieldMap),
    Filter(Filter),
}

impl<'a> RowMatcher<'a> {
    fn new(predicate: &'a Predicate) -> Result<Self> {
        if predicate.is_all() {
            return Ok(Self::All);
        }
        match predicate {
            Predicate::All => Ok(Self::All),
            Predicate::Fields(map) => Ok(Self::Fields(map)),
            Predicate::Raw(raw) => Ok(Self::Filter(Filter::parse(raw)?)),
        }
    }

    fn matches(&self, row: &Row) -> Result<bool> {
        match self {
            Self::All => Ok(true),
            Self::Fields(map) => Ok(map.iter().all(|(column, expected)| {
                let actual = row.get(column).unwrap_or(&Value::Null);
                if expected.is_null() {
                    actual.is_null()
                } else {
                    actual.sql_eq(expected)
                }
            })),
            Self::Filter(filter) => filter.matches(row),
        }
    }
}

/// In-process relational engine: one auto-increment integer primary key per
/// table, schemaless rows.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, name: &str, primary_key: &str) -> Result<()> {
        let mut tables = self.tables.write()?;
        if tables.contains_key(name) {
            return Err(ModelError::TableExists(name.to_string()));
        }
        tables.insert(name.to_string(), MemTable::new(primary_key));
        Ok(())
    }

    /// Builder form of [`create_table`](Self::create_table).
    pub fn with_table(self, name: &str, primary_key: &str) -> Result<Self> {
        self.create_table(name, primary_key)?;
        Ok(self)
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.tables
            .write()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ModelError::TableNotFound(name.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables
            .read()
            .map(|tables| tables.contains_key(name))
            .unwrap_or(false)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table)
            .ok_or_else(|| ModelError::TableNotFound(table.to_string()))?;
        Ok(table.rows.len())
    }

    fn write_row(&self, table_name: &str, fields: &FieldMap, overwrite: bool) -> Result<EntityId> {
        let mut tables = self.tables.write()?;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| ModelError::TableNotFound(table_name.to_string()))?;

        let id = match table.key_for(fields)? {
            Some(id) if !overwrite && table.rows.contains_key(&id) => {
                return Err(ModelError::ConstraintViolation(format!(
                    "Duplicate primary key {} in table '{}'",
                    id, table_name
                )));
            }
            Some(id) => id,
            None => table.next_id,
        };
        Ok(table.store(id, fields))
    }
}

impl Storage for MemoryStorage {
    fn select(
        &self,
        table_name: &str,
        selection: &Selection,
        predicate: &Predicate,
        order: Option<&str>,
        limit: Option<Limit>,
    ) -> Result<Vec<Row>> {
        trace!(sql = %sql::render_select(table_name, selection, predicate, order, limit), "memory storage select");

        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| ModelError::TableNotFound(table_name.to_string()))?;

        let ids = table.matching_ids(predicate)?;
        if *selection == Selection::Count {
            let mut row = Row::new();
            row.insert(COUNT_COLUMN.to_string(), Value::Integer(ids.len() as i64));
            return Ok(vec![row]);
        }

        let mut rows: Vec<Row> = ids.iter().filter_map(|id| table.rows.get(id).cloned()).collect();
        if let Some(order) = order.map(str::trim).filter(|o| !o.is_empty()) {
            filter::sort_rows(&mut rows, &filter::parse_order(order)?);
        }
        if let Some(limit) = limit {
            rows = limit.apply(rows);
        }

        if let Selection::Columns(columns) = selection {
            rows = rows
                .into_iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect()
                })
                .collect();
        }
        Ok(rows)
    }

    fn insert(&self, table: &str, fields: &FieldMap) -> Result<EntityId> {
        trace!(sql = %sql::render_insert(table, fields, super::WriteMode::Insert), "memory storage insert");
        self.write_row(table, fields, false)
    }

    fn replace(&self, table: &str, fields: &FieldMap) -> Result<EntityId> {
        trace!(sql = %sql::render_insert(table, fields, super::WriteMode::Replace), "memory storage replace");
        self.write_row(table, fields, true)
    }

    fn update(&self, table_name: &str, fields: &FieldMap, predicate: &Predicate) -> Result<u64> {
        trace!(sql = %sql::render_update(table_name, fields, predicate), "memory storage update");

        let mut tables = self.tables.write()?;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| ModelError::TableNotFound(table_name.to_string()))?;

        let ids = table.matching_ids(predicate)?;
        if let Some(new_key) = table.key_for(fields)?
            && ids.iter().any(|id| *id != new_key)
        {
            return Err(ModelError::ConstraintViolation(format!(
                "Primary key '{}' cannot be changed by an update",
                table.primary_key
            )));
        }

        for id in &ids {
            if let Some(row) = table.rows.get_mut(id) {
                for (column, value) in fields {
                    row.insert(column.clone(), value.clone());
                }
            }
        }
        Ok(ids.len() as u64)
    }

    fn delete(&self, table_name: &str, predicate: &Predicate, limit: Option<u64>) -> Result<u64> {
        trace!(sql = %sql::render_delete(table_name, predicate, limit), "memory storage delete");

        let mut tables = self.tables.write()?;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| ModelError::TableNotFound(table_name.to_string()))?;

        let mut ids = table.matching_ids(predicate)?;
        if let Some(limit) = limit {
            ids.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        for id in &ids {
            table.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }
}
