//! Error definitions for all `schema_typegen` generation stages.

use thiserror::Error;

#[derive(Debug, Error)]
/// Top-level error type returned by public APIs.
pub enum TypegenError {
    /// Snapshot shape failure (missing models, bad schema registry ids, ...).
    #[error("snapshot error: {0}")]
    Snapshot(String),
    /// A model or child-schema name that cannot become a type identifier.
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },
    /// Generation for one model failed; wraps the underlying cause.
    #[error("model '{model}': {source}")]
    Model {
        model: String,
        #[source]
        source: Box<TypegenError>,
    },
    /// Malformed custom-types region in previously generated output.
    #[error("custom region error: {0}")]
    CustomRegion(String),
    /// Snapshot or config (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Filesystem I/O error from CLI or callers that propagate I/O.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TypegenError {
    pub(crate) fn invalid_identifier(identifier: &str, reason: impl Into<String>) -> Self {
        TypegenError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn in_model(self, model: &str) -> Self {
        match self {
            already @ TypegenError::Model { .. } => already,
            other => TypegenError::Model {
                model: model.to_string(),
                source: Box::new(other),
            },
        }
    }
}
