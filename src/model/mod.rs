//! Entities, their registry and the unit of work that owns both.

pub mod args;
pub mod context;
pub mod entity;
pub mod list;
pub mod macros;
pub mod registry;
pub mod schema;
pub mod search;
pub mod typed;

pub use args::QueryArg;
pub use context::{DataSource, UnitOfWork};
pub use entity::Entity;
pub use list::{Iter, ResultList};
pub use registry::Registry;
pub use schema::{Cardinality, Catalog, ModelDef, Relation};
pub use search::Window;
pub use typed::Model;
