use axum::{extract::State, Json};
use insight_core::finding::{self, WeeklyReport};

use crate::error::AppError;
use crate::state::AppState;

/// GET /reports/weekly: executive summary over all findings.
pub async fn weekly_report(State(app): State<AppState>) -> Result<Json<WeeklyReport>, AppError> {
    let db = app.db.clone();
    let findings = tokio::task::spawn_blocking(move || db.list_findings())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(finding::weekly_report(&findings)))
}
