use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub upload_dir: String,
    pub resources: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = if state.db.ping().await.is_ok() {
        "connected"
    } else {
        "disconnected"
    };

    let upload_dir_status = match tokio::fs::metadata(&state.config.upload_dir).await {
        Ok(meta) if meta.is_dir() => "ready",
        // Created on the first upload
        _ => "missing",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        database: db_status.to_string(),
        upload_dir: upload_dir_status.to_string(),
        resources: state.resources.backend().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
