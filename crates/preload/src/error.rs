use std::fmt;

use crate::value::Value;

/// Failures raised by a model accessor that no reconciliation policy recovers.
///
/// `Conflict` and `MultipleFound` are never returned by a store directly; the
/// list pass converts the corresponding outcome variants into them so a
/// single cause can be wrapped in [`PreloadError::ListData`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The dotted model name does not resolve to a persisted record type.
    UnknownModel(String),
    /// A field name is not part of the model's schema.
    UnknownField { model: String, field: String },
    /// Integrity conflict on create or save.
    Conflict { model: String, reason: String },
    /// A lookup expected to match one record matched several.
    MultipleFound {
        model: String,
        field: String,
        value: Value,
        count: usize,
    },
    /// Any other failure of the underlying persistence layer.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownModel(name) => write!(f, "unknown model: {name}"),
            Self::UnknownField { model, field } => {
                write!(f, "model '{model}' has no field '{field}'")
            }
            Self::Conflict { model, reason } => {
                write!(f, "model '{model}': integrity conflict: {reason}")
            }
            Self::MultipleFound { model, field, value, count } => {
                write!(f, "model '{model}': {count} records match {field}={value}")
            }
            Self::Backend(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug)]
pub enum PreloadError {
    /// Fatal failure during the list pass. Earlier writes are not rolled back.
    ListData { model: String, cause: StoreError },
    /// No unique field was declared and none could be inferred.
    NoUniqueField { model: String },
    /// A record declaration lacks a value for the model's unique field.
    MissingUniqueValue {
        model: String,
        field: String,
        index: usize,
    },
    /// Unrecoverable store failure outside the list pass.
    Store { model: String, cause: StoreError },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Declaration validation error (empty model name, identical remap, etc.).
    ConfigValidation(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for PreloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListData { model, cause } => {
                write!(f, "failed to load list data for '{model}': {cause}")
            }
            Self::NoUniqueField { model } => write!(
                f,
                "model '{model}': no unique field declared and none could be inferred"
            ),
            Self::MissingUniqueValue { model, field, index } => write!(
                f,
                "model '{model}', record #{index}: missing value for unique field '{field}'"
            ),
            Self::Store { model, cause } => write!(f, "model '{model}': {cause}"),
            Self::ConfigParse(msg) => write!(f, "declaration parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "declaration validation error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for PreloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ListData { cause, .. } | Self::Store { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

impl PreloadError {
    /// True for failures of the list pass, the only pass whose errors are
    /// always fatal regardless of cause.
    pub fn is_list_failure(&self) -> bool {
        matches!(self, Self::ListData { .. })
    }
}
