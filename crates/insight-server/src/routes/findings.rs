use axum::{extract::State, Json};
use insight_core::finding::{self, DailyTrend, Finding, FindingSummary};
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::{ApiPath, ApiQuery};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 200;
const DEFAULT_TREND_DAYS: u32 = 14;

// ---------------------------------------------------------------------------
// List / Show
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// GET /findings: newest first, without evidence payloads.
pub async fn list_findings(
    State(app): State<AppState>,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> Result<Json<Vec<FindingSummary>>, AppError> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    let db = app.db.clone();
    let findings = tokio::task::spawn_blocking(move || db.list_findings())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(
        findings.iter().take(limit).map(FindingSummary::from).collect(),
    ))
}

/// GET /findings/{id}
pub async fn get_finding(
    State(app): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Finding>, AppError> {
    let db = app.db.clone();
    let finding = tokio::task::spawn_blocking(move || db.get_finding(&id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(finding))
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct TrendsQuery {
    pub days: Option<u32>,
}

/// GET /findings/trends/daily?days=N
pub async fn daily_trends(
    State(app): State<AppState>,
    ApiQuery(q): ApiQuery<TrendsQuery>,
) -> Result<Json<Vec<DailyTrend>>, AppError> {
    let days = q.days.unwrap_or(DEFAULT_TREND_DAYS);
    if days == 0 {
        return Err(AppError::bad_request("days must be at least 1"));
    }
    let db = app.db.clone();
    let findings = tokio::task::spawn_blocking(move || db.list_findings())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(finding::daily_trends(
        &findings,
        days,
        chrono::Utc::now(),
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
