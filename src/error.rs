use thiserror::Error;

use crate::ingest::AdapterError;

/// Every failure the query engine and the ingestion path can surface.
///
/// Only `Validation` is produced before any SQL is issued; all other
/// variants carry enough context (operation, entity) to render a precise
/// message at the HTTP edge.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{operation} failed: {source}")]
    DataAccess {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{operation} cancelled: deadline exceeded")]
    Cancelled { operation: &'static str },

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns a closure suitable for `map_err` that tags a `sqlx::Error`
    /// with the operation that was attempted.
    pub(crate) fn data_access(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::DataAccess { operation, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
