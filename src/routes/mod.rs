pub mod docs;
pub mod game;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::cors::api_cors;
use crate::middleware::generation_guard::{generation_guard_middleware, GenerationGuard};
use crate::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let guard = GenerationGuard::new(state.config.max_inflight_generations);

    let generation_api = Router::new()
        .route("/generate-game", post(game::generate_game))
        .layer(axum::middleware::from_fn_with_state(
            guard,
            generation_guard_middleware,
        ));

    Router::new()
        .route("/", get(health::service_info))
        .route("/health", get(health::health))
        .route("/openapi.json", get(docs::openapi))
        .merge(generation_api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
