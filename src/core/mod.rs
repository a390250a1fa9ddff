pub mod error;
pub mod types;
pub mod value;

pub use error::{BackendError, ModelError, Result};
pub use types::{EntityId, FieldMap, Row, fields};
pub use value::{FromValue, Value};
