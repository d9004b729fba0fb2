use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Mail session could not be established or was lost mid-command
    #[error("Connection error: {0}")]
    Connection(String),
    /// Operation attempted in the wrong session state
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Classification error: {0}")]
    Classification(String),
    #[error("Decryption error: {0}")]
    Decryption(String),
    #[error("Publish error: {0}")]
    Publish(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                DomainError::Internal(format!("Database error: {}", db_err.message()))
            }
            other => DomainError::Internal(format!("Database error: {}", other)),
        }
    }
}
