use axum::Json;
use utoipa::OpenApi;

use crate::dto::game_dto::{GenerateGameRequest, GenerateGameResponse};
use crate::models::game::{GameMeta, GamePayload, PrivateAnswerKey, PublicOption, PublicPuzzle};
use crate::models::question::{Difficulty, OptionLetter};

#[derive(OpenApi)]
#[openapi(
    paths(super::game::generate_game, super::health::health, super::health::service_info),
    components(schemas(
        GenerateGameRequest,
        GenerateGameResponse,
        GamePayload,
        GameMeta,
        PublicPuzzle,
        PublicOption,
        PrivateAnswerKey,
        Difficulty,
        OptionLetter
    )),
    info(title = "Game Maker Agent", description = "Generates multiple-choice puzzles from chapter PDFs")
)]
pub struct ApiDoc;

pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
