use std::collections::BTreeMap;

use super::Value;

/// Primary key of a stored record.
pub type EntityId = i64;

/// Field name to value mapping. Ordered so that diffs and cache keys are stable.
pub type FieldMap = BTreeMap<String, Value>;

/// One row as returned by storage.
pub type Row = FieldMap;

/// Builds a [`FieldMap`] from name/value pairs.
pub fn fields<I, K, V>(pairs: I) -> FieldMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
