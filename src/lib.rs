// ============================================================================
// fezmodel: active-record entities over a relational store and a KV cache
// ============================================================================

pub mod cache;
pub mod config;
pub mod core;
pub mod model;
pub mod storage;

#[doc(hidden)]
pub use paste;

pub use crate::cache::{CacheStore, MemoryCache};
pub use crate::config::ModelConfig;
pub use crate::core::{BackendError, EntityId, FieldMap, FromValue, ModelError, Result, Row, Value, fields};
pub use crate::model::{
    Cardinality, DataSource, Entity, Model, ModelDef, QueryArg, Relation, ResultList, UnitOfWork,
};
pub use crate::storage::{BulkWriter, Limit, MemoryStorage, Predicate, Selection, Storage, WriteMode};
