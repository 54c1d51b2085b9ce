use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("unknown action type: {0}")]
    UnknownActionType(String),

    #[error("invalid params for {action_type}: {reason}")]
    InvalidParams { action_type: String, reason: String },

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Jira API error ({status}): {body}")]
    Jira { status: u16, body: String },

    #[error("no 'Done' or 'Closed' transition available for {0}")]
    NoClosingTransition(String),

    #[error("kubernetes client config: {0}")]
    KubeConfig(String),

    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ExecutorError {
    pub(crate) fn params(action_type: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidParams {
            action_type: action_type.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
