use crate::core::{FieldMap, Result};
use crate::storage::{Limit, Predicate};

/// Positional argument of [`Entity::related_many`](super::Entity::related_many):
/// `where`, `order` and `limit`, in that order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryArg {
    #[default]
    Null,
    Text(String),
    Fields(FieldMap),
}

impl QueryArg {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Fields(_) => false,
        }
    }

    pub(crate) fn to_predicate(&self) -> Predicate {
        match self {
            _ if self.is_null() => Predicate::All,
            Self::Text(raw) => Predicate::Raw(raw.clone()),
            Self::Fields(map) => Predicate::Fields(map.clone()),
            Self::Null => Predicate::All,
        }
    }

    /// `None` when the argument is not text.
    pub(crate) fn to_order(&self) -> Option<Option<String>> {
        match self {
            _ if self.is_null() => Some(None),
            Self::Text(order) => Some(Some(order.trim().to_string())),
            _ => None,
        }
    }

    pub(crate) fn to_limit(&self) -> Option<Result<Option<Limit>>> {
        match self {
            _ if self.is_null() => Some(Ok(None)),
            Self::Text(clause) => Some(Limit::parse(clause).map(Some)),
            _ => None,
        }
    }
}

impl From<&str> for QueryArg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for QueryArg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<FieldMap> for QueryArg {
    fn from(map: FieldMap) -> Self {
        Self::Fields(map)
    }
}

impl From<Predicate> for QueryArg {
    fn from(predicate: Predicate) -> Self {
        match predicate {
            Predicate::All => Self::Null,
            Predicate::Raw(raw) => Self::Text(raw),
            Predicate::Fields(map) => Self::Fields(map),
        }
    }
}

impl<T: Into<QueryArg>> From<Option<T>> for QueryArg {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or_default()
    }
}

/// Scopes `filter` to rows whose `key` column equals `id`.
///
/// Structured filters are merged key first, so an explicit entry for `key`
/// in `filter` wins. Raw filters are wrapped: `` `key` = id AND (filter) ``.
pub(crate) fn scope_to_owner(filter: Predicate, key: &str, id: i64) -> Predicate {
    match filter {
        Predicate::Fields(map) => {
            let mut scoped = FieldMap::new();
            scoped.insert(key.to_string(), id.into());
            scoped.extend(map);
            Predicate::Fields(scoped)
        }
        other if other.is_all() => Predicate::eq(key, id),
        other => other.and_eq(key, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Value, fields};

    #[test]
    fn test_scope_structured_filter() {
        let scoped = scope_to_owner(Predicate::Fields(fields([("status", "active")])), "owner_id", 7);
        assert_eq!(
            scoped,
            Predicate::Fields(fields([("owner_id", Value::from(7)), ("status", Value::from("active"))]))
        );
    }

    #[test]
    fn test_scope_explicit_key_wins() {
        let scoped = scope_to_owner(Predicate::eq("owner_id", 9), "owner_id", 7);
        assert_eq!(scoped, Predicate::eq("owner_id", 9));
    }

    #[test]
    fn test_scope_raw_filter() {
        let scoped = scope_to_owner(Predicate::from("age > 3"), "owner_id", 7);
        assert_eq!(scoped, Predicate::Raw("`owner_id` = 7 AND (age > 3)".to_string()));
        assert_eq!(scope_to_owner(Predicate::All, "owner_id", 7), Predicate::eq("owner_id", 7));
        assert_eq!(scope_to_owner(Predicate::from("  "), "owner_id", 7), Predicate::eq("owner_id", 7));
    }

    #[test]
    fn test_arg_conversions() {
        assert!(QueryArg::from(None::<&str>).is_null());
        assert_eq!(QueryArg::from("id DESC").to_order(), Some(Some("id DESC".to_string())));
        assert_eq!(QueryArg::Fields(FieldMap::new()).to_order(), None);
        assert_eq!(QueryArg::from("5,10").to_limit().unwrap().unwrap(), Some(Limit::new(5, 10)));
        assert!(QueryArg::from("ten").to_limit().unwrap().is_err());
    }
}
