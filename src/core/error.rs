use thiserror::Error;

use super::EntityId;

/// Failure reported by a backing service (relational store or key-value cache).
///
/// These are never retried here: a retry policy belongs to the transport adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("{service} unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("{kind} #{id} not found")]
    NotFound { kind: String, id: EntityId },

    #[error("Model '{0}' is not registered")]
    UnknownModel(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Unit of work has already been dropped")]
    UnitOfWorkClosed,

    #[error("Lock error: {0}")]
    LockError(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ModelError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl<T> From<std::sync::PoisonError<T>> for ModelError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for ModelError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ModelError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<sqlparser::parser::ParserError> for ModelError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Self::ParseError(err.to_string())
    }
}
