use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use crate::cache::slice_window;
use crate::core::{EntityId, Result};
use crate::storage::Predicate;
use crate::storage::sql::quote_ident;

use super::{Entity, Model, ModelDef, UnitOfWork};

/// Ordered ids of one model, materialized into entities on access.
///
/// Each position starts empty. The first access resolves it through the
/// unit of work's registry and the list keeps that instance for the position,
/// even after the registry evicts it.
pub struct ResultList {
    uow: UnitOfWork,
    def: Arc<ModelDef>,
    ids: Vec<EntityId>,
    slots: RefCell<Vec<Option<Entity>>>,
}

impl ResultList {
    pub(crate) fn new(uow: UnitOfWork, def: Arc<ModelDef>, ids: Vec<EntityId>) -> Self {
        let slots = RefCell::new(vec![None; ids.len()]);
        Self { uow, def, ids, slots }
    }

    fn derive(&self, ids: Vec<EntityId>) -> Self {
        Self::new(self.uow.clone(), Arc::clone(&self.def), ids)
    }

    pub fn kind(&self) -> &str {
        self.def.kind()
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn count(&self) -> usize {
        self.len()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    /// Entity at `index`. Unloaded until one of its fields is read.
    pub fn get(&self, index: usize) -> Option<Entity> {
        let id = *self.ids.get(index)?;
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(index)?;
        Some(slot.get_or_insert_with(|| self.uow.resolve(&self.def, id)).clone())
    }

    /// Number of positions resolved so far.
    pub fn resolved(&self) -> usize {
        self.slots.borrow().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn first(&self) -> Option<Entity> {
        self.get(0)
    }

    pub fn last(&self) -> Option<Entity> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter { list: self, position: 0 }
    }

    /// Iterates as typed models.
    pub fn iter_as<'a, M: Model + 'a>(&'a self) -> impl Iterator<Item = M> + 'a {
        self.iter().map(M::from_entity)
    }

    /// Keeps ids for which `keep` returns true, without loading anything.
    pub fn filter(&self, mut keep: impl FnMut(EntityId) -> bool) -> ResultList {
        self.derive(self.ids.iter().copied().filter(|id| keep(*id)).collect())
    }

    /// Keeps entities for which `keep` returns true. Loads each entity it inspects.
    pub fn filter_entities(&self, mut keep: impl FnMut(&Entity) -> Result<bool>) -> Result<ResultList> {
        let mut ids = Vec::new();
        for entity in self.iter() {
            if keep(&entity)? {
                ids.extend(entity.id());
            }
        }
        Ok(self.derive(ids))
    }

    /// Replaces every id with `f(id)`.
    pub fn map(&self, f: impl FnMut(EntityId) -> EntityId) -> ResultList {
        self.derive(self.ids.iter().copied().map(f).collect())
    }

    /// Maps every entity to a plain value.
    pub fn map_values<T>(&self, mut f: impl FnMut(&Entity) -> Result<T>) -> Result<Vec<T>> {
        self.iter().map(|entity| f(&entity)).collect()
    }

    pub fn fold<T>(&self, init: T, f: impl FnMut(T, EntityId) -> T) -> T {
        self.ids.iter().copied().fold(init, f)
    }

    /// Window of this list; see [`slice_window`] for the offset and limit rules.
    pub fn slice(&self, offset: i64, limit: Option<i64>) -> ResultList {
        self.derive(self.ids[slice_window(self.ids.len(), offset, limit)].to_vec())
    }

    pub fn reversed(&self) -> ResultList {
        self.derive(self.ids.iter().rev().copied().collect())
    }

    /// First occurrence of each id, order kept.
    pub fn unique(&self) -> ResultList {
        let mut seen = std::collections::HashSet::new();
        self.filter(|id| seen.insert(id))
    }

    /// `` `column` IN (ids) `` for use in another query.
    pub fn in_predicate(&self, column: &str) -> Predicate {
        if self.ids.is_empty() {
            return Predicate::Raw("1 = 0".to_string());
        }
        Predicate::Raw(format!("{} IN ({})", quote_ident(column), self))
    }
}

/// Comma-separated ids.
impl fmt::Display for ResultList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ResultList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultList")
            .field("kind", &self.kind())
            .field("ids", &self.ids)
            .finish()
    }
}

pub struct Iter<'a> {
    list: &'a ResultList,
    position: usize,
}

impl Iter<'_> {
    /// Starts over from the first element.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl Iterator for Iter<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let entity = self.list.get(self.position)?;
        self.position += 1;
        Some(entity)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.list.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a ResultList {
    type Item = Entity;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}
