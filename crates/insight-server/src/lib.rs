pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health))
        // Remediation actions
        .route("/actions", get(routes::actions::list_actions))
        .route("/actions/", get(routes::actions::list_actions))
        .route("/actions/{id}", get(routes::actions::get_action))
        .route(
            "/actions/{id}/approve",
            post(routes::actions::approve_action),
        )
        .route("/actions/{id}/reject", post(routes::actions::reject_action))
        // Findings
        .route("/findings", get(routes::findings::list_findings))
        .route("/findings/", get(routes::findings::list_findings))
        .route(
            "/findings/trends/daily",
            get(routes::findings::daily_trends),
        )
        .route("/findings/{id}", get(routes::findings::get_finding))
        // Reports
        .route("/reports/weekly", get(routes::reports::weekly_report))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the API on a pre-bound listener until the process is stopped.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port
/// first (useful when binding port 0).
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(app_state);

    tracing::info!("insight API listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
