//! Error types shared by every stage of PROTO processing.

use thiserror::Error;

use crate::vrml::FieldType;

/// Errors that can occur while tokenizing, resolving or instantiating PROTOs.
///
/// Every variant aborts the step in progress; nothing is cached or
/// materialized from a failed step. The type is `Clone` so that one failed
/// resolution can be reported to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtoError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Failed to fetch '{url}': {reason}")]
    Network { url: String, reason: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Scene document error: {0}")]
    Document(String),
}

impl ProtoError {
    pub(crate) fn type_mismatch(parameter: &str, expected: FieldType, found: FieldType) -> Self {
        ProtoError::Schema(format!(
            "Type mismatch, setting {} to {} parameter '{}'",
            found, expected, parameter
        ))
    }
}

/// Result type for PROTO operations.
pub type ProtoResult<T> = Result<T, ProtoError>;
