//! Result union of every configuration operation.

use shared::pagination::PageError;
use thiserror::Error;

/// Failure of a configuration operation.
///
/// Each kind maps to one HTTP-style status code, see [`ConfigError::status_code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Caller-correctable input: bad key, bad operator, percent sum, duplicate key.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity does not exist or does not belong to the given parent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Repository failure, including a rolled back transaction.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored data could not be converted to or from its external representation.
    #[error("Mapping error: {0}")]
    Mapping(String),
}

impl ConfigError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// HTTP-style status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Storage(_) | Self::Mapping(_) => 500,
        }
    }

    /// Short machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage_error",
            Self::Mapping(_) => "mapping_error",
        }
    }

    /// The human-readable cause without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::Storage(msg)
            | Self::Mapping(msg) => msg,
        }
    }
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |err| match err.message.as_ref() {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, err.code),
                })
            })
            .collect();
        // field_errors() iterates a HashMap
        messages.sort();
        ConfigError::Validation(messages.join(", "))
    }
}

impl From<PageError> for ConfigError {
    fn from(err: PageError) -> Self {
        ConfigError::Validation(err.to_string())
    }
}
