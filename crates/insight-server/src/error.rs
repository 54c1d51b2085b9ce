use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use insight_core::error::InsightError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// Every body is JSON with an `error` key. Invalid transitions additionally
/// carry `kind` and `current_status` so a client can tell "someone already
/// acted on this" apart from a generic failure.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

/// A request the extractors refused before any handler ran.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Rejected {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(InsightError::InvalidInput(msg.into()).into())
    }

    /// Carry an extractor rejection's status and text into a JSON body.
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self(
            Rejected {
                status,
                message: message.into(),
            }
            .into(),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(r) = self.0.downcast_ref::<Rejected>() {
            let body = serde_json::json!({ "error": r.message, "kind": "bad_request" });
            return (r.status, axum::Json(body)).into_response();
        }
        let Some(e) = self.0.downcast_ref::<InsightError>() else {
            let body = serde_json::json!({ "error": self.0.to_string() });
            return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
        };

        let status = match e {
            InsightError::ActionNotFound(_) | InsightError::FindingNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            InsightError::InvalidTransition { .. } | InsightError::ActionExists(_) => {
                StatusCode::CONFLICT
            }
            InsightError::InvalidStatus(_) | InsightError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            InsightError::NotInitialized
            | InsightError::Db(_)
            | InsightError::Io(_)
            | InsightError::Yaml(_)
            | InsightError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match e {
            InsightError::InvalidTransition { from, to, .. } => serde_json::json!({
                "error": e.to_string(),
                "kind": "invalid_transition",
                "current_status": from,
                "requested_status": to,
            }),
            InsightError::ActionNotFound(_) | InsightError::FindingNotFound(_) => {
                serde_json::json!({ "error": e.to_string(), "kind": "not_found" })
            }
            _ => serde_json::json!({ "error": e.to_string() }),
        };

        if status.is_server_error() {
            tracing::error!(error = %e, "request failed");
        }
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
