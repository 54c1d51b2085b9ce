use insight_core::ActionStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure, including request timeouts.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response that carries no more specific meaning.
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The action already left `proposed`; someone else acted on it.
    #[error("action {id} is already {current_status}")]
    InvalidTransition {
        id: String,
        current_status: ActionStatus,
    },

    #[error("action not found: {0}")]
    NotFound(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// The id is not in the session's local set.
    #[error("action {0} is not in the current list")]
    UnknownAction(String),
}

impl ClientError {
    /// Transport and unexpected-status failures leave server state unknown but
    /// untouched by this client; the command can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_current_status() {
        let err = ClientError::InvalidTransition {
            id: "a1".into(),
            current_status: ActionStatus::Rejected,
        };
        assert_eq!(err.to_string(), "action a1 is already rejected");
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_errors_are_retryable() {
        let err = ClientError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(err.is_retryable());
        assert!(!ClientError::NotFound("a1".into()).is_retryable());
    }
}
