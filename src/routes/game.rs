use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    dto::game_dto::{GenerateGameRequest, GenerateGameResponse},
    error::Result,
    AppState,
};

#[utoipa::path(
    post,
    path = "/generate-game",
    request_body(content = GenerateGameRequest, description = "Optional; an empty body uses defaults"),
    responses(
        (status = 200, description = "Game generated", body = GenerateGameResponse),
        (status = 400, description = "Invalid request body or difficulty_target out of range"),
        (status = 429, description = "Too many generations in flight"),
        (status = 500, description = "Source document or formatting failure"),
        (status = 502, description = "Model failure or chapter rejected by validation"),
        (status = 503, description = "Model provider rate limit exhausted")
    )
)]
#[axum::debug_handler]
pub async fn generate_game(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let request = GenerateGameRequest::from_body(&body)?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "generate_game",
        %request_id,
        difficulty_target = request.difficulty_target
    );
    let game = state
        .game_service
        .generate_game(request.target())
        .instrument(span)
        .await?;

    Ok((StatusCode::OK, Json(GenerateGameResponse::success(game))))
}
