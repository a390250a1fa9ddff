use crate::core::{EntityId, Result};
use crate::storage::Predicate;

use super::{Entity, ModelDef, ResultList, UnitOfWork};

/// Statically typed view over [`Entity`], usually generated by [`model!`](crate::model!).
pub trait Model: Sized {
    const KIND: &'static str;

    fn definition() -> ModelDef;

    fn from_entity(entity: Entity) -> Self;

    fn entity(&self) -> &Entity;

    fn fetch(uow: &UnitOfWork, id: EntityId) -> Result<Self> {
        uow.get(Self::KIND, id).map(Self::from_entity)
    }

    /// Fetches and loads, surfacing a missing row as `NotFound`.
    fn find(uow: &UnitOfWork, id: EntityId) -> Result<Self> {
        uow.find(Self::KIND, id).map(Self::from_entity)
    }

    fn create(uow: &UnitOfWork) -> Result<Self> {
        uow.create(Self::KIND).map(Self::from_entity)
    }

    fn search(
        uow: &UnitOfWork,
        predicate: impl Into<Predicate>,
        order: Option<&str>,
        limit: Option<&str>,
    ) -> Result<ResultList> {
        uow.search(Self::KIND, predicate, order, limit)
    }

    fn id(&self) -> Option<EntityId> {
        self.entity().id()
    }

    fn commit(&self) -> Result<bool> {
        self.entity().commit()
    }
}
