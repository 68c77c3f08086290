use crate::models::question::{ChapterResult, Difficulty, OptionLetter, Question, QuestionOption};

pub(crate) fn question(
    chapter_id: &str,
    number: usize,
    difficulty: Difficulty,
    rating: i64,
    correct: OptionLetter,
) -> Question {
    Question {
        id: format!("ch{}_q{:02}", chapter_id, number),
        chapter_id: chapter_id.to_string(),
        chapter_title: format!("Chapter {}", chapter_id),
        question: format!(
            "Ch{}: how does concept number {} relate to the surrounding text?",
            chapter_id, number
        ),
        options: OptionLetter::ALL
            .iter()
            .map(|letter| QuestionOption {
                letter: *letter,
                text: format!("Option {} for question {}", letter, number),
            })
            .collect(),
        correct_option: correct,
        difficulty,
        difficulty_rating: rating,
        min_solve_time_seconds: Some(45),
        source_chunk_index: Some((number as i64 - 1) % 5),
        explanation: format!("The source text states why answer {} holds.", correct),
        unknown_option_ids: Vec::new(),
    }
}

/// Two medium and three hard questions, every answer on B.
pub(crate) fn valid_chapter(chapter_id: &str) -> ChapterResult {
    let questions = vec![
        question(chapter_id, 1, Difficulty::Medium, 500, OptionLetter::B),
        question(chapter_id, 2, Difficulty::Medium, 600, OptionLetter::B),
        question(chapter_id, 3, Difficulty::Hard, 700, OptionLetter::B),
        question(chapter_id, 4, Difficulty::Hard, 800, OptionLetter::B),
        question(chapter_id, 5, Difficulty::Hard, 850, OptionLetter::B),
    ];
    ChapterResult {
        chapter_id: chapter_id.to_string(),
        chapter_title: format!("Chapter {}", chapter_id),
        questions,
        num_chunks: 5,
    }
}
