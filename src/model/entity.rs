use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::keys::object_key;
use crate::core::{EntityId, FieldMap, FromValue, ModelError, Result, Row, Value};
use crate::storage::{Predicate, Selection};

use super::args::scope_to_owner;
use super::context::Shared;
use super::{Cardinality, ModelDef, QueryArg, Registry, Relation, ResultList, UnitOfWork};

#[derive(Debug, Default)]
struct State {
    id: Option<EntityId>,
    fields: FieldMap,
    baseline: FieldMap,
    /// Fields written with a composite value since the last sync.
    forced: HashSet<String>,
    loaded: bool,
    is_new: bool,
    read_only: bool,
}

impl State {
    fn absorb(&mut self, row: Row) {
        self.baseline = row.clone();
        self.fields = row;
        self.forced.clear();
        self.loaded = true;
    }

    fn sync(&mut self) {
        self.baseline = self.fields.clone();
        self.forced.clear();
    }

    fn is_dirty(&self) -> bool {
        !self.forced.is_empty() || self.fields != self.baseline
    }

    /// Every field whose current value differs from the baseline, with
    /// removed fields reported as `NULL`, plus every composite write.
    fn changes(&self) -> FieldMap {
        let mut changes = FieldMap::new();
        for name in &self.forced {
            let current = self.fields.get(name).cloned().unwrap_or(Value::Null);
            changes.insert(name.clone(), current);
        }
        for (name, old) in &self.baseline {
            let current = self.fields.get(name).unwrap_or(&Value::Null);
            if current != old {
                changes.insert(name.clone(), current.clone());
            }
        }
        for (name, value) in &self.fields {
            if !self.baseline.contains_key(name) {
                changes.insert(name.clone(), value.clone());
            }
        }
        changes
    }
}

struct Inner {
    def: Arc<ModelDef>,
    shared: Rc<Shared>,
    registry: Weak<RefCell<Registry>>,
    state: RefCell<State>,
    related: RefCell<HashMap<String, Entity>>,
}

/// Handle to one record of a model.
///
/// Clones are the same instance: a change made through one handle is seen
/// through every other. Existing records load lazily on first field access,
/// from the object cache when possible and from storage otherwise.
#[derive(Clone)]
pub struct Entity {
    inner: Rc<Inner>,
}

impl Entity {
    fn build(uow: &UnitOfWork, def: Arc<ModelDef>, state: State) -> Self {
        let state = State {
            read_only: def.is_read_only(),
            ..state
        };
        Self {
            inner: Rc::new(Inner {
                def,
                shared: Rc::clone(&uow.shared),
                registry: Rc::downgrade(&uow.registry),
                state: RefCell::new(state),
                related: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn unloaded(uow: &UnitOfWork, def: Arc<ModelDef>, id: EntityId) -> Self {
        Self::build(uow, def, State {
            id: Some(id),
            ..State::default()
        })
    }

    pub(crate) fn preloaded(uow: &UnitOfWork, def: Arc<ModelDef>, row: Row) -> Result<Self> {
        let id = row
            .get(def.primary_key())
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                ModelError::TypeMismatch(format!(
                    "row for {} has no integer '{}' column",
                    def.kind(),
                    def.primary_key()
                ))
            })?;

        Ok(Self::build(uow, def, State {
            id: Some(id),
            fields: row.clone(),
            baseline: row,
            loaded: true,
            ..State::default()
        }))
    }

    pub(crate) fn new_record(uow: &UnitOfWork, def: Arc<ModelDef>) -> Self {
        Self::build(uow, def, State {
            is_new: true,
            ..State::default()
        })
    }

    pub fn id(&self) -> Option<EntityId> {
        self.inner.state.borrow().id
    }

    pub fn kind(&self) -> &str {
        self.inner.def.kind()
    }

    pub fn definition(&self) -> &ModelDef {
        &self.inner.def
    }

    pub fn is_new(&self) -> bool {
        self.inner.state.borrow().is_new
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.borrow().loaded
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.state.borrow().read_only
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.inner.state.borrow_mut().read_only = read_only;
    }

    /// True when both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The unit of work this entity was handed out by.
    pub fn unit_of_work(&self) -> Result<UnitOfWork> {
        UnitOfWork::from_parts(Rc::clone(&self.inner.shared), &self.inner.registry)
    }

    /// Fetches the row if it has not been fetched yet. No-op for new records.
    pub fn load(&self) -> Result<()> {
        let id = {
            let state = self.inner.state.borrow();
            match state.id {
                Some(id) if !state.loaded && !state.is_new => id,
                _ => return Ok(()),
            }
        };

        let shared = &self.inner.shared;
        let def = &self.inner.def;
        let key = object_key(def.kind(), id);

        if let Some(bytes) = shared.cache.get(&key)? {
            let row: Row = rmp_serde::from_slice(&bytes)?;
            trace!(kind = def.kind(), id, "entity loaded from cache");
            self.inner.state.borrow_mut().absorb(row);
            return Ok(());
        }

        let rows = shared.storage.select(
            def.table(),
            &Selection::All,
            &Predicate::eq(def.primary_key(), id),
            None,
            None,
        )?;
        let row = rows.into_iter().next().ok_or_else(|| ModelError::NotFound {
            kind: def.kind().to_string(),
            id,
        })?;

        shared
            .cache
            .set(&key, &rmp_serde::to_vec(&row)?, Some(shared.config.object_ttl))?;
        trace!(kind = def.kind(), id, "entity loaded from storage");
        self.inner.state.borrow_mut().absorb(row);
        Ok(())
    }

    /// Current value of `field`, `None` when absent.
    pub fn get(&self, field: &str) -> Result<Option<Value>> {
        self.load()?;
        Ok(self.inner.state.borrow().fields.get(field).cloned())
    }

    /// Typed read. Absent and `NULL` fields are both `None`.
    pub fn get_as<T: FromValue>(&self, field: &str) -> Result<Option<T>> {
        match self.get(field)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value).map(Some),
        }
    }

    /// True when `field` is present and not `NULL`.
    pub fn has(&self, field: &str) -> Result<bool> {
        self.load()?;
        Ok(self
            .inner
            .state
            .borrow()
            .fields
            .get(field)
            .is_some_and(|v| !v.is_null()))
    }

    /// Copy of every current field.
    pub fn fields(&self) -> Result<FieldMap> {
        self.load()?;
        Ok(self.inner.state.borrow().fields.clone())
    }

    /// Ignored on read-only entities.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        if self.is_read_only() {
            trace!(kind = self.kind(), field, "write ignored on read-only entity");
            return Ok(());
        }
        self.load()?;

        let value = value.into();
        let mut state = self.inner.state.borrow_mut();
        if value.is_composite() {
            state.forced.insert(field.to_string());
        } else {
            state.forced.remove(field);
        }
        state.fields.insert(field.to_string(), value);
        Ok(())
    }

    pub fn set_data<K, V>(&self, data: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (field, value) in data {
            self.set(field.as_ref(), value)?;
        }
        Ok(())
    }

    /// Removes `field`. A field that was part of the loaded row is kept as
    /// `NULL` so the next commit clears it.
    pub fn unset(&self, field: &str) -> Result<()> {
        if self.is_read_only() {
            return Ok(());
        }
        self.load()?;

        let mut state = self.inner.state.borrow_mut();
        state.fields.remove(field);
        state.forced.remove(field);
        if state.baseline.contains_key(field) {
            state.fields.insert(field.to_string(), Value::Null);
        }
        Ok(())
    }

    /// An entity whose state is borrowed elsewhere counts as modified.
    pub fn is_modified(&self) -> bool {
        match self.inner.state.try_borrow() {
            Ok(state) => state.is_dirty(),
            Err(_) => true,
        }
    }

    /// Fields a commit would write right now.
    pub fn changes(&self) -> FieldMap {
        let state = self.inner.state.borrow();
        if state.is_new {
            state.fields.clone()
        } else {
            state.changes()
        }
    }

    /// Discards uncommitted changes.
    pub fn reset(&self) {
        let mut state = self.inner.state.borrow_mut();
        state.fields = state.baseline.clone();
        state.forced.clear();
    }

    /// Writes pending changes. Returns `false` when there was nothing to write.
    ///
    /// New records are inserted and registered under their assigned id;
    /// existing ones are updated by primary key with the changed fields only.
    pub fn commit(&self) -> Result<bool> {
        let (payload, is_new, id) = {
            let state = self.inner.state.borrow();
            let payload = if state.is_new {
                state.fields.clone()
            } else {
                state.changes()
            };
            (payload, state.is_new, state.id)
        };
        if payload.is_empty() {
            return Ok(false);
        }

        let shared = &self.inner.shared;
        let def = &self.inner.def;

        let id = if is_new {
            let uow = self.unit_of_work()?;
            let id = shared.storage.insert(def.table(), &payload)?;
            {
                let mut state = self.inner.state.borrow_mut();
                state.id = Some(id);
                state.fields.insert(def.primary_key().to_string(), Value::Integer(id));
                state.is_new = false;
                state.loaded = true;
                state.sync();
            }
            uow.register(def.kind(), id, self.clone());
            debug!(kind = def.kind(), id, "entity inserted");
            id
        } else {
            let id = id.ok_or_else(|| {
                ModelError::ConstraintViolation(format!("{} has no primary key", def.kind()))
            })?;
            let affected = shared
                .storage
                .update(def.table(), &payload, &Predicate::eq(def.primary_key(), id))?;
            self.inner.state.borrow_mut().sync();
            debug!(kind = def.kind(), id, fields = payload.len(), affected, "entity updated");
            id
        };

        let snapshot = rmp_serde::to_vec(&self.inner.state.borrow().fields)?;
        shared
            .cache
            .set(&object_key(def.kind(), id), &snapshot, Some(shared.config.commit_ttl))?;
        Ok(true)
    }

    fn relation(&self, name: &str, cardinality: Cardinality) -> Option<Relation> {
        self.inner
            .def
            .get_relation(name)
            .filter(|rel| rel.cardinality == cardinality)
            .cloned()
    }

    /// Follows a to-one relation. `None` when `name` is not a to-one relation
    /// or the local key is empty.
    ///
    /// The target is remembered until the local key changes.
    pub fn related(&self, name: &str) -> Result<Option<Entity>> {
        let Some(relation) = self.relation(name, Cardinality::One) else {
            return Ok(None);
        };
        let Some(target) = self.get(&relation.local_key)?.as_ref().and_then(Value::as_i64) else {
            return Ok(None);
        };

        if let Some(entity) = self.inner.related.borrow().get(name) {
            if entity.id() == Some(target) {
                return Ok(Some(entity.clone()));
            }
        }

        let entity = self.unit_of_work()?.get(&relation.foreign, target)?;
        self.inner
            .related
            .borrow_mut()
            .insert(name.to_string(), entity.clone());
        Ok(Some(entity))
    }

    /// Records of a to-many relation, optionally narrowed by
    /// `[where, order, limit]`.
    ///
    /// `None` when `name` is not a to-many relation, more than three
    /// arguments are given, an argument has the wrong shape, or this record
    /// has no id yet.
    pub fn related_many(&self, name: &str, args: &[QueryArg]) -> Result<Option<ResultList>> {
        if args.len() > 3 {
            return Ok(None);
        }
        let Some((relation, id)) = self.to_many(name) else {
            return Ok(None);
        };

        let null = QueryArg::Null;
        let filter = args.first().unwrap_or(&null).to_predicate();
        let Some(order) = args.get(1).unwrap_or(&null).to_order() else {
            return Ok(None);
        };
        let limit = match args.get(2).unwrap_or(&null).to_limit() {
            Some(limit) => limit?,
            None => return Ok(None),
        };

        let uow = self.unit_of_work()?;
        let foreign = uow.definition(&relation.foreign)?;
        let predicate = scope_to_owner(filter, &relation.local_key, id);

        let rows = self.inner.shared.storage.select(
            foreign.table(),
            &Selection::column(foreign.primary_key()),
            &predicate,
            order.as_deref(),
            limit,
        )?;
        let ids = rows
            .iter()
            .filter_map(|row| row.get(foreign.primary_key()).and_then(Value::as_i64))
            .collect();

        Ok(Some(ResultList::new(uow, foreign, ids)))
    }

    /// Number of records in a to-many relation, optionally narrowed by `where`.
    ///
    /// `None` under the same conditions as [`related_many`](Self::related_many),
    /// and when more than one argument is given.
    pub fn related_many_count(&self, name: &str, args: &[QueryArg]) -> Result<Option<u64>> {
        if args.len() > 1 {
            return Ok(None);
        }
        let Some((relation, id)) = self.to_many(name) else {
            return Ok(None);
        };

        let filter = args.first().map(QueryArg::to_predicate).unwrap_or(Predicate::All);
        let foreign = self.inner.shared.catalog.get(&relation.foreign)?;
        let predicate = scope_to_owner(filter, &relation.local_key, id);

        self.inner
            .shared
            .storage
            .count(foreign.table(), &predicate)
            .map(Some)
    }

    fn to_many(&self, name: &str) -> Option<(Relation, EntityId)> {
        let relation = self.relation(name, Cardinality::Many)?;
        Some((relation, self.id()?))
    }

    /// Forgets memoized related entities.
    pub(crate) fn release(&self) {
        if let Ok(mut related) = self.inner.related.try_borrow_mut() {
            related.clear();
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Entity")
                .field("kind", &self.kind())
                .field("id", &state.id)
                .field("loaded", &state.loaded)
                .field("modified", &state.is_dirty())
                .finish(),
            Err(_) => f.debug_struct("Entity").field("kind", &self.kind()).finish_non_exhaustive(),
        }
    }
}

/// The id, or an empty string for an unsaved record.
impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}", id),
            None => Ok(()),
        }
    }
}

impl From<&Entity> for Value {
    fn from(entity: &Entity) -> Self {
        entity.id().map(Value::Integer).unwrap_or(Value::Null)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Value::from(&entity)
    }
}
