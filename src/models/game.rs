use crate::models::question::{Difficulty, OptionLetter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PublicOption {
    pub option_id: OptionLetter,
    pub text: String,
}

/// Client-visible puzzle. Carries no correctness information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PublicPuzzle {
    pub puzzle_id: String,
    pub chapter_id: String,
    pub chapter_title: String,
    pub question: String,
    pub options: Vec<PublicOption>,
    pub difficulty: Difficulty,
    pub difficulty_rating: i64,
    pub min_solve_time_seconds: u32,
    pub source_chunk_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrivateAnswerKey {
    pub puzzle_id: String,
    pub chapter_id: String,
    pub correct_option_id: OptionLetter,
    /// `"{puzzle_id}|{correct_option_id}"`
    pub anchor_string: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GameMeta {
    pub total_questions: usize,
    pub questions_per_chapter: usize,
    pub chapters: Vec<String>,
    pub chapter_titles: BTreeMap<String, String>,
    pub difficulty_target: u32,
    #[schema(value_type = Object)]
    pub difficulty_distribution_per_chapter: BTreeMap<Difficulty, usize>,
    pub model_used: String,
    pub temperature: f32,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GamePayload {
    pub meta: GameMeta,
    pub public_puzzles: Vec<PublicPuzzle>,
    pub private_answer_key: Vec<PrivateAnswerKey>,
}
