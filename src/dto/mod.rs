pub mod game_dto;
pub mod llm_dto;
