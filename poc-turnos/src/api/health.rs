//! Health check endpoint

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::error;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Database clock, proving a round trip succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_time: Option<String>,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_time: Result<String, sqlx::Error> = sqlx::query_scalar("SELECT datetime('now')")
        .fetch_one(&state.db)
        .await;

    match db_time {
        Ok(db_time) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                module: Some(env!("CARGO_PKG_NAME").to_string()),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                db_time: Some(db_time),
            }),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "error".to_string(),
                    module: None,
                    version: None,
                    db_time: None,
                }),
            )
        }
    }
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health_check))
}
