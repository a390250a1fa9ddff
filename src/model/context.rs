use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::trace;

use crate::cache::CacheStore;
use crate::config::ModelConfig;
use crate::core::{EntityId, FieldMap, ModelError, Result};
use crate::storage::Storage;

use super::{Catalog, Entity, Model, ModelDef, Registry};

/// Backends and model definitions shared by every unit of work.
///
/// Cheap to clone and safe to hand to other threads; each thread opens its
/// own [`UnitOfWork`].
#[derive(Clone)]
pub struct DataSource {
    storage: Arc<dyn Storage>,
    cache: Arc<dyn CacheStore>,
    catalog: Catalog,
    config: ModelConfig,
}

impl DataSource {
    pub fn new(storage: Arc<dyn Storage>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            storage,
            cache,
            catalog: Catalog::new(),
            config: ModelConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_model(mut self, def: ModelDef) -> Result<Self> {
        self.register(def)?;
        Ok(self)
    }

    pub fn register(&mut self, def: ModelDef) -> Result<()> {
        self.catalog.register(def)
    }

    pub fn register_model<M: Model>(&mut self) -> Result<()> {
        self.register(M::definition())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Opens a fresh unit of work with an empty registry.
    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork {
            shared: Rc::new(Shared {
                storage: Arc::clone(&self.storage),
                cache: Arc::clone(&self.cache),
                catalog: self.catalog.clone(),
                config: self.config.clone(),
            }),
            registry: Rc::new(RefCell::new(Registry::new(self.config.registry_capacity))),
        }
    }
}

pub(crate) struct Shared {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) cache: Arc<dyn CacheStore>,
    pub(crate) catalog: Catalog,
    pub(crate) config: ModelConfig,
}

/// One request-scoped session: owns the identity map and hands out entities.
///
/// Clones share the same registry. Not `Send`; entities live and die on the
/// thread that opened them.
#[derive(Clone)]
pub struct UnitOfWork {
    pub(crate) shared: Rc<Shared>,
    pub(crate) registry: Rc<RefCell<Registry>>,
}

impl UnitOfWork {
    pub(crate) fn from_parts(shared: Rc<Shared>, registry: &Weak<RefCell<Registry>>) -> Result<Self> {
        let registry = registry.upgrade().ok_or(ModelError::UnitOfWorkClosed)?;
        Ok(Self { shared, registry })
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.shared.storage
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.shared.cache
    }

    pub fn config(&self) -> &ModelConfig {
        &self.shared.config
    }

    pub fn definition(&self, kind: &str) -> Result<Arc<ModelDef>> {
        self.shared.catalog.get(kind)
    }

    /// Resident entity for `(kind, id)`, or a fresh unloaded one.
    ///
    /// Nothing is read until a field is accessed.
    pub fn get(&self, kind: &str, id: EntityId) -> Result<Entity> {
        let def = self.definition(kind)?;
        Ok(self.resolve(&def, id))
    }

    /// Like [`get`](Self::get) but loads the row now, surfacing `NotFound`.
    pub fn find(&self, kind: &str, id: EntityId) -> Result<Entity> {
        let entity = self.get(kind, id)?;
        entity.load()?;
        Ok(entity)
    }

    pub(crate) fn resolve(&self, def: &Arc<ModelDef>, id: EntityId) -> Entity {
        self.registry.borrow_mut().get_or_insert_with(def.kind(), id, || {
            trace!(kind = def.kind(), id, "registering unloaded entity");
            Entity::unloaded(self, Arc::clone(def), id)
        })
    }

    /// Builds an entity from an already fetched row and registers it,
    /// replacing any resident instance with the same id.
    pub fn get_or_create(&self, kind: &str, row: FieldMap) -> Result<Entity> {
        let def = self.definition(kind)?;
        let entity = Entity::preloaded(self, def, row)?;
        if let Some(id) = entity.id() {
            self.registry.borrow_mut().insert(kind, id, entity.clone());
        }
        Ok(entity)
    }

    /// New record. It joins the registry on its first commit.
    pub fn create(&self, kind: &str) -> Result<Entity> {
        let def = self.definition(kind)?;
        Ok(Entity::new_record(self, def))
    }

    pub(crate) fn register(&self, kind: &str, id: EntityId, entity: Entity) {
        self.registry.borrow_mut().insert(kind, id, entity);
    }

    /// Evicts the oldest unmodified entities of `kind` above capacity.
    pub fn cleanup(&self, kind: &str) -> usize {
        self.registry.borrow_mut().cleanup(kind)
    }

    /// Empties the registry for `kind`. Modified entities survive unless `force`.
    pub fn reset_all(&self, kind: &str, force: bool) -> usize {
        self.registry.borrow_mut().reset_all(kind, force)
    }

    /// Number of registered entities of `kind`.
    pub fn resident(&self, kind: &str) -> usize {
        self.registry.borrow().len(kind)
    }

    pub fn is_resident(&self, kind: &str, id: EntityId) -> bool {
        self.registry.borrow().contains(kind, id)
    }

    /// Registered ids of `kind`, oldest first.
    pub fn resident_ids(&self, kind: &str) -> Vec<EntityId> {
        self.registry.borrow().ids(kind)
    }

    /// Commits every modified resident entity of `kind`. Returns how many wrote.
    pub fn commit_all(&self, kind: &str) -> Result<usize> {
        let entities: Vec<Entity> = {
            let registry = self.registry.borrow();
            registry
                .ids(kind)
                .into_iter()
                .filter_map(|id| registry.lookup(kind, id))
                .filter(Entity::is_modified)
                .collect()
        };

        let mut written = 0;
        for entity in entities {
            if entity.commit()? {
                written += 1;
            }
        }
        Ok(written)
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("kinds", &self.shared.catalog.kinds().collect::<Vec<_>>())
            .finish()
    }
}
