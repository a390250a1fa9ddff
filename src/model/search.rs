//! Cached id-list search.
//!
//! The full id list of a `(kind, where, order)` query is stored under one
//! cache key for the search TTL. Every limit window over the same query is
//! answered from that list, so a window never costs a storage round trip
//! once the list is cached.

use tracing::debug;

use crate::cache::keys::search_key;
use crate::cache::slice_window;
use crate::core::{EntityId, ModelError, Result, Value};
use crate::storage::{Predicate, Selection};

use super::{ResultList, UnitOfWork};

/// Window over a search result: `"count"` or `"offset,count"`.
///
/// Unlike a storage `LIMIT`, either part may be negative, see [`slice_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub offset: i64,
    pub limit: Option<i64>,
}

impl Window {
    pub fn new(offset: i64, limit: Option<i64>) -> Self {
        Self { offset, limit }
    }

    pub fn parse(clause: &str) -> Result<Self> {
        let clause = clause.trim();
        if clause.is_empty() {
            return Ok(Self::default());
        }

        let number = |s: &str| {
            s.trim()
                .parse::<i64>()
                .map_err(|_| ModelError::ParseError(format!("Invalid limit clause: '{}'", clause)))
        };
        match clause.split(',').collect::<Vec<_>>().as_slice() {
            [count] => Ok(Self::new(0, Some(number(count)?))),
            [offset, count] => Ok(Self::new(number(offset)?, Some(number(count)?))),
            _ => Err(ModelError::ParseError(format!("Invalid limit clause: '{}'", clause))),
        }
    }
}

impl UnitOfWork {
    /// Ids of `kind` matching `predicate`, ordered by `order`, windowed by `limit`.
    ///
    /// On a cache miss the full id list is read from storage, pushed to the
    /// search cache and windowed locally.
    pub fn search(
        &self,
        kind: &str,
        predicate: impl Into<Predicate>,
        order: Option<&str>,
        limit: Option<&str>,
    ) -> Result<ResultList> {
        let def = self.definition(kind)?;
        let predicate = predicate.into();
        let order = order.map(str::trim).filter(|o| !o.is_empty());
        let window = limit.map(Window::parse).transpose()?.unwrap_or_default();
        let key = search_key(kind, &predicate, order);
        let cache = self.cache();

        if cache.exists(&key)? {
            let cached = cache.list_slice(&key, window.offset, window.limit)?;
            // An empty slice of a key that is gone means it expired after `exists`.
            if !cached.is_empty() || cache.list_len(&key)? > 0 {
                let ids = cached
                    .iter()
                    .map(|raw| {
                        raw.parse::<EntityId>()
                            .map_err(|_| ModelError::Codec(format!("Invalid id '{}' in {}", raw, key)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                debug!(kind, key = %key, hits = ids.len(), "search cache hit");
                return Ok(ResultList::new(self.clone(), def, ids));
            }
            debug!(kind, key = %key, "search cache entry expired during read");
        }

        let rows = self.storage().select(
            def.table(),
            &Selection::column(def.primary_key()),
            &predicate,
            order,
            None,
        )?;
        let ids: Vec<EntityId> = rows
            .iter()
            .filter_map(|row| row.get(def.primary_key()).and_then(Value::as_i64))
            .collect();

        let encoded: Vec<String> = ids.iter().map(EntityId::to_string).collect();
        if cache.list_push(&key, &encoded)? > 0 {
            cache.expire(&key, self.config().search_ttl)?;
        }
        debug!(kind, key = %key, rows = ids.len(), "search cache miss");

        let window = slice_window(ids.len(), window.offset, window.limit);
        Ok(ResultList::new(self.clone(), def, ids[window].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_parse() {
        assert_eq!(Window::parse("10").unwrap(), Window::new(0, Some(10)));
        assert_eq!(Window::parse("5, 10").unwrap(), Window::new(5, Some(10)));
        assert_eq!(Window::parse("-3,-1").unwrap(), Window::new(-3, Some(-1)));
        assert_eq!(Window::parse("").unwrap(), Window::default());
        assert!(Window::parse("1,2,3").is_err());
        assert!(Window::parse("ten").is_err());
    }
}
