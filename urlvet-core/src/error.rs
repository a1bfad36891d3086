use thiserror::Error;
use urlvet_model::TransitionError;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("scan not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub(crate) fn db(err: sqlx::Error) -> Self {
        ScanError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
