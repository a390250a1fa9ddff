use std::fmt;

use crate::core::{FieldMap, ModelError, Result, Value};

use super::sql::quote_ident;

/// Filter applied by `select`, `update` and `delete`.
///
/// `Fields` is an AND-conjunction of equality tests (`NULL` becomes `IS NULL`);
/// `Raw` is a filter expression handed to the backend as written.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    Raw(String),
    Fields(FieldMap),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = FieldMap::new();
        map.insert(column.into(), value.into());
        Self::Fields(map)
    }

    /// Adds an equality test, turning `All` into a structured predicate.
    ///
    /// Raw predicates get the test prepended with `AND`.
    pub fn and_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self {
            Self::All => Self::eq(column, value),
            Self::Fields(mut map) => {
                map.insert(column, value);
                Self::Fields(map)
            }
            Self::Raw(raw) => Self::Raw(format!(
                "{} {} AND ({})",
                quote_ident(&column),
                value.sql_comparison(),
                raw
            )),
        }
    }

    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::Raw(raw) => raw.trim().is_empty(),
            Self::Fields(map) => map.is_empty(),
        }
    }

    /// Stable textual encoding, used to derive search cache keys.
    pub fn canonical(&self) -> String {
        match self {
            Self::All => String::new(),
            Self::Raw(raw) => format!("raw:{}", raw.trim()),
            Self::Fields(map) => {
                let encoded: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), canonical_value(v)))
                    .collect();
                format!("fields:{}", serde_json::Value::Object(encoded))
            }
        }
    }
}

fn canonical_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => (*i).into(),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => s.clone().into(),
        Value::Boolean(b) => (*b as i64).into(),
        Value::Json(j) => j.clone(),
    }
}

impl From<&str> for Predicate {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for Predicate {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

impl From<FieldMap> for Predicate {
    fn from(map: FieldMap) -> Self {
        Self::Fields(map)
    }
}

impl<T: Into<Predicate>> From<Option<T>> for Predicate {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Predicate::All)
    }
}

/// Columns requested by `select`.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    Columns(Vec<String>),
    /// `COUNT(*)`; the result is one row with a `count` column.
    Count,
}

impl Selection {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Columns(vec![name.into()])
    }
}

pub const COUNT_COLUMN: &str = "count";

/// `LIMIT` clause: `"count"` or `"offset,count"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    pub offset: u64,
    pub count: Option<u64>,
}

impl Limit {
    pub fn new(offset: u64, count: u64) -> Self {
        Self { offset, count: Some(count) }
    }

    pub fn parse(clause: &str) -> Result<Self> {
        let parts: Vec<&str> = clause.split(',').map(str::trim).collect();
        let number = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| ModelError::ParseError(format!("Invalid LIMIT clause: '{}'", clause)))
        };
        match parts.as_slice() {
            [count] => Ok(Self { offset: 0, count: Some(number(count)?) }),
            [offset, count] => Ok(Self {
                offset: number(offset)?,
                count: Some(number(count)?),
            }),
            _ => Err(ModelError::ParseError(format!("Invalid LIMIT clause: '{}'", clause))),
        }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let take = self
            .count
            .map(|c| usize::try_from(c).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(take).collect()
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.offset, self.count) {
            (0, Some(count)) => write!(f, "{}", count),
            (offset, Some(count)) => write!(f, "{},{}", offset, count),
            (offset, None) => write!(f, "{},18446744073709551615", offset),
        }
    }
}

/// How `insert_batch` treats rows whose primary key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    Replace,
}

impl WriteMode {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Replace => "REPLACE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fields;

    #[test]
    fn test_limit_parse() {
        assert_eq!(Limit::parse("10").unwrap(), Limit::new(0, 10));
        assert_eq!(Limit::parse("5, 10").unwrap(), Limit::new(5, 10));
        assert!(Limit::parse("a,b").is_err());
        assert!(Limit::parse("1,2,3").is_err());
    }

    #[test]
    fn test_limit_apply() {
        let limit = Limit::new(1, 2);
        assert_eq!(limit.apply(vec![1, 2, 3, 4]), vec![2, 3]);
        assert_eq!(limit.to_string(), "1,2");
    }

    #[test]
    fn test_and_eq_merges_into_fields() {
        let predicate = Predicate::eq("status", "active").and_eq("owner_id", 7);
        assert_eq!(
            predicate,
            Predicate::Fields(fields([
                ("owner_id", Value::Integer(7)),
                ("status", Value::from("active")),
            ]))
        );
    }

    #[test]
    fn test_and_eq_prepends_to_raw() {
        let predicate = Predicate::from("price > 5").and_eq("owner_id", 7);
        assert_eq!(predicate, Predicate::Raw("`owner_id` = 7 AND (price > 5)".into()));
    }

    #[test]
    fn test_and_eq_escapes_raw_column() {
        let predicate = Predicate::from("price > 5").and_eq("odd`col", 1);
        assert_eq!(predicate, Predicate::Raw("`odd``col` = 1 AND (price > 5)".into()));
    }

    #[test]
    fn test_canonical_is_order_independent() {
        let a = Predicate::Fields(fields([("a", 1), ("b", 2)]));
        let b = Predicate::Fields(fields([("b", 2), ("a", 1)]));
        assert_eq!(a.canonical(), b.canonical());
        assert_ne!(a.canonical(), Predicate::from("a = 1").canonical());
    }
}
