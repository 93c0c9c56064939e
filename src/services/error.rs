//! Error type shared by the content services

use crate::db::{classify_error, DbErrorKind};

/// Error types for content service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The addressed record does not exist (or is not visible to the caller)
    #[error("{0} not found")]
    NotFound(String),

    /// A unique field collides with an existing record
    #[error("{0}")]
    Duplicate(String),

    /// Input failed validation
    #[error("{0}")]
    Validation(String),

    /// The caller may not perform this operation
    #[error("{0}")]
    Forbidden(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Map a failed INSERT/UPDATE: unique violations become `Duplicate`,
    /// dangling references become `Validation`.
    pub fn from_write(err: anyhow::Error, entity: &str) -> Self {
        match classify_error(&err) {
            DbErrorKind::UniqueViolation => Self::Duplicate(format!("{} already exists", entity)),
            DbErrorKind::ForeignKeyViolation => {
                Self::Validation("Referenced record does not exist".to_string())
            }
            DbErrorKind::Other => Self::Internal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ServiceError::not_found("Announcement 4").to_string(), "Announcement 4 not found");
        assert_eq!(ServiceError::validation("Title is required").to_string(), "Title is required");
    }

    #[test]
    fn test_from_write_passes_other_errors_through() {
        let err = ServiceError::from_write(anyhow::anyhow!("disk full"), "Category");
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
