use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "status": "healthy",
        "version": state.config.version,
        "model": state.config.llm.model_name,
    });
    (StatusCode::OK, Json(body))
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service metadata"))
)]
#[axum::debug_handler]
pub async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    let body = json!({
        "service": state.config.app_name,
        "version": state.config.version,
        "endpoints": {
            "generate_game": "POST /generate-game",
            "health": "GET /health",
            "openapi": "GET /openapi.json",
        },
    });
    (StatusCode::OK, Json(body))
}
