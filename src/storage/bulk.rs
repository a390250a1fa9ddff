use std::sync::Arc;

use tracing::debug;

use crate::core::{ModelError, Result, Value};

use super::{Storage, WriteMode};

/// Buffers rows for one table and writes them in a single batch.
pub struct BulkWriter {
    storage: Arc<dyn Storage>,
    mode: WriteMode,
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl BulkWriter {
    pub fn new<S: Into<String>>(
        storage: Arc<dyn Storage>,
        mode: WriteMode,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            storage,
            mode,
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Buffers a row and returns its index in the pending batch.
    pub fn add(&mut self, values: Vec<Value>) -> Result<usize> {
        if values.len() != self.columns.len() {
            return Err(ModelError::ConstraintViolation(format!(
                "Expected {} values for table '{}', got {}",
                self.columns.len(),
                self.table,
                values.len()
            )));
        }
        self.rows.push(values);
        Ok(self.rows.len() - 1)
    }

    /// Drops a pending row; later indices shift down by one.
    pub fn remove(&mut self, index: usize) -> Option<Vec<Value>> {
        (index < self.rows.len()).then(|| self.rows.remove(index))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes every pending row and clears the buffer. An empty buffer is a no-op.
    pub fn commit(&mut self) -> Result<u64> {
        if self.rows.is_empty() {
            return Ok(0);
        }
        let rows = std::mem::take(&mut self.rows);
        debug!(table = %self.table, rows = rows.len(), mode = self.mode.keyword(), "bulk write");
        self.storage.insert_batch(&self.table, &self.columns, &rows, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Predicate};

    fn writer(mode: WriteMode) -> (Arc<MemoryStorage>, BulkWriter) {
        let storage = Arc::new(MemoryStorage::new().with_table("stops", "id").unwrap());
        let writer = BulkWriter::new(storage.clone(), mode, "stops", ["id", "name"]);
        (storage, writer)
    }

    #[test]
    fn test_add_remove_commit() {
        let (storage, mut writer) = writer(WriteMode::Insert);
        assert_eq!(writer.add(vec![1.into(), "a".into()]).unwrap(), 0);
        assert_eq!(writer.add(vec![2.into(), "b".into()]).unwrap(), 1);
        assert_eq!(writer.add(vec![3.into(), "c".into()]).unwrap(), 2);
        writer.remove(1);

        assert_eq!(writer.commit().unwrap(), 2);
        assert!(writer.is_empty());
        assert_eq!(storage.row_count("stops").unwrap(), 2);
        assert_eq!(storage.count("stops", &Predicate::eq("id", 2)).unwrap(), 0);
    }

    #[test]
    fn test_empty_commit_is_noop() {
        let (_, mut writer) = writer(WriteMode::Insert);
        assert_eq!(writer.commit().unwrap(), 0);
    }

    #[test]
    fn test_replace_mode_overwrites() {
        let (storage, mut writer) = writer(WriteMode::Replace);
        writer.add(vec![1.into(), "a".into()]).unwrap();
        writer.add(vec![1.into(), "b".into()]).unwrap();
        writer.commit().unwrap();
        assert_eq!(storage.row_count("stops").unwrap(), 1);
        assert_eq!(storage.count("stops", &Predicate::eq("name", "b")).unwrap(), 1);
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let (_, mut writer) = writer(WriteMode::Insert);
        assert!(writer.add(vec![1.into()]).is_err());
    }
}
