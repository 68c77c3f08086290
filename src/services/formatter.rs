use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::game::{GameMeta, GamePayload, PrivateAnswerKey, PublicOption, PublicPuzzle};
use crate::models::question::{ChapterResult, OptionLetter, Question};
use std::collections::BTreeMap;

pub fn make_puzzle_id(chapter_id: &str, position: usize) -> String {
    format!("ch{}_q{:02}", chapter_id, position)
}

/// `"{puzzle_id}|{letter}"`, the string anchored on-chain by downstream
/// systems. No hashing happens here.
pub fn make_anchor_string(puzzle_id: &str, correct: OptionLetter) -> String {
    format!("{}|{}", puzzle_id, correct)
}

/// Merges validated chapters into the client payload: public puzzles with no
/// correctness information plus an index-aligned private answer key.
pub fn format_game(chapters: &[ChapterResult], difficulty_target: u32, config: &Config) -> Result<GamePayload> {
    let per_chapter = config.game.questions_per_chapter;
    if chapters.len() != config.chapters.len() {
        return Err(Error::Formatting(format!(
            "expected {} chapters, got {}",
            config.chapters.len(),
            chapters.len()
        )));
    }

    let mut ordered: Vec<(usize, &ChapterResult)> = Vec::with_capacity(chapters.len());
    for chapter in chapters {
        let position = config
            .chapters
            .iter()
            .position(|c| c.id == chapter.chapter_id)
            .ok_or_else(|| Error::Formatting(format!("unknown chapter '{}'", chapter.chapter_id)))?;
        if ordered.iter().any(|(p, _)| *p == position) {
            return Err(Error::Formatting(format!(
                "chapter '{}' appears more than once",
                chapter.chapter_id
            )));
        }
        ordered.push((position, chapter));
    }
    ordered.sort_by_key(|(position, _)| *position);

    let total = chapters.len() * per_chapter;
    let mut public_puzzles = Vec::with_capacity(total);
    let mut private_answer_key = Vec::with_capacity(total);
    let mut chapter_titles = BTreeMap::new();

    for (_, chapter) in &ordered {
        if chapter.questions.len() != per_chapter {
            return Err(Error::Formatting(format!(
                "chapter '{}' has {} questions, expected {}",
                chapter.chapter_id,
                chapter.questions.len(),
                per_chapter
            )));
        }
        chapter_titles.insert(chapter.chapter_id.clone(), chapter.chapter_title.clone());

        for (index, question) in chapter.questions.iter().enumerate() {
            let puzzle_id = make_puzzle_id(&chapter.chapter_id, index + 1);
            public_puzzles.push(public_puzzle(chapter, question, &puzzle_id)?);
            private_answer_key.push(PrivateAnswerKey {
                anchor_string: make_anchor_string(&puzzle_id, question.correct_option),
                puzzle_id,
                chapter_id: chapter.chapter_id.clone(),
                correct_option_id: question.correct_option,
                explanation: question.explanation.clone(),
            });
        }
    }

    let meta = GameMeta {
        total_questions: public_puzzles.len(),
        questions_per_chapter: per_chapter,
        chapters: ordered.iter().map(|(_, c)| c.chapter_id.clone()).collect(),
        chapter_titles,
        difficulty_target,
        difficulty_distribution_per_chapter: config.game.difficulty_distribution.clone(),
        model_used: config.llm.model_name.clone(),
        temperature: config.llm.temperature,
        version: config.version.clone(),
    };

    tracing::info!(
        chapters = ordered.len(),
        public_puzzles = public_puzzles.len(),
        private_keys = private_answer_key.len(),
        "Formatted game payload"
    );
    for key in &private_answer_key {
        tracing::trace!(anchor = %key.anchor_string, "Anchor");
    }

    Ok(GamePayload {
        meta,
        public_puzzles,
        private_answer_key,
    })
}

fn public_puzzle(chapter: &ChapterResult, question: &Question, puzzle_id: &str) -> Result<PublicPuzzle> {
    let min_solve_time_seconds = non_negative(question.min_solve_time_seconds)
        .ok_or_else(|| missing(puzzle_id, "min_solve_time_seconds"))?;
    let source_chunk_index =
        non_negative(question.source_chunk_index).ok_or_else(|| missing(puzzle_id, "source_chunk_index"))?;

    let mut options: Vec<PublicOption> = question
        .options
        .iter()
        .map(|o| PublicOption {
            option_id: o.letter,
            text: o.text.clone(),
        })
        .collect();
    options.sort_by_key(|o| o.option_id);

    Ok(PublicPuzzle {
        puzzle_id: puzzle_id.to_string(),
        chapter_id: chapter.chapter_id.clone(),
        chapter_title: chapter.chapter_title.clone(),
        question: question.question.clone(),
        options,
        difficulty: question.difficulty,
        difficulty_rating: question.difficulty_rating,
        min_solve_time_seconds,
        source_chunk_index,
    })
}

fn non_negative(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn missing(puzzle_id: &str, field: &str) -> Error {
    Error::Formatting(format!("{}: missing or invalid {}", puzzle_id, field))
}
