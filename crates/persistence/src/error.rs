//! Repository error type.

use domain::ConfigError;
use thiserror::Error;

/// Failure reported by a repository operation.
///
/// `NotFound` is kept apart from every other failure so callers can answer 404.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RepoError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<RepoError> for ConfigError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { entity, id } => {
                ConfigError::NotFound(format!("{} {} not found", entity, id))
            }
            RepoError::Database(e) => ConfigError::Storage(format!("database error: {}", e)),
            RepoError::Storage(msg) => ConfigError::Storage(msg),
        }
    }
}
