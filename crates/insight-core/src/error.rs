use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("not initialized: run 'insight init'")]
    NotInitialized,

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("action already exists: {0}")]
    ActionExists(String),

    #[error("finding not found: {0}")]
    FindingNotFound(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid action status: {0}")]
    InvalidStatus(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Db(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl InsightError {
    /// Wrap any redb error kind in [`InsightError::Db`].
    pub(crate) fn db(err: impl std::fmt::Display) -> Self {
        Self::Db(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
