use axum::{extract::State, Json};
use insight_core::db::ActionFilter;
use insight_core::{ActionStatus, RemediationAction};
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub status: Option<String>,
    pub finding_id: Option<String>,
}

/// GET /actions/: full snapshot, newest proposal first.
pub async fn list_actions(
    State(app): State<AppState>,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> Result<Json<Vec<RemediationAction>>, AppError> {
    let status = q
        .status
        .as_deref()
        .map(str::parse::<ActionStatus>)
        .transpose()?;
    let filter = ActionFilter {
        status,
        finding_id: q.finding_id,
    };
    let db = app.db.clone();
    let actions = tokio::task::spawn_blocking(move || db.list_actions(&filter))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(actions))
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

/// GET /actions/{id}
pub async fn get_action(
    State(app): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<RemediationAction>, AppError> {
    let db = app.db.clone();
    let action = tokio::task::spawn_blocking(move || db.get_action(&id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(action))
}

// ---------------------------------------------------------------------------
// Approve / Reject
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ReviewBody {
    #[serde(default = "default_reviewer")]
    pub approved_by: String,
}

fn default_reviewer() -> String {
    "system".to_string()
}

/// POST /actions/{id}/approve: `proposed → approved`, 409 from any other status.
pub async fn approve_action(
    State(app): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<ReviewBody>,
) -> Result<Json<RemediationAction>, AppError> {
    let db = app.db.clone();
    let reviewer = body.approved_by;
    let result = tokio::task::spawn_blocking(move || db.approve(&id, &reviewer))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    log_review("approved", &result);
    Ok(Json(result?))
}

/// POST /actions/{id}/reject: `proposed → rejected`, 409 from any other status.
pub async fn reject_action(
    State(app): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<ReviewBody>,
) -> Result<Json<RemediationAction>, AppError> {
    let db = app.db.clone();
    let reviewer = body.approved_by;
    let result = tokio::task::spawn_blocking(move || db.reject(&id, &reviewer))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;
    log_review("rejected", &result);
    Ok(Json(result?))
}

fn log_review(verb: &str, result: &insight_core::Result<RemediationAction>) {
    match result {
        Ok(action) => tracing::info!(
            id = %action.id,
            by = action.approved_by.as_deref().unwrap_or_default(),
            "action {verb}"
        ),
        Err(e) => tracing::warn!(error = %e, "review not applied"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
