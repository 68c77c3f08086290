use crate::config::GameSettings;
use crate::error::{Rule, ValidationError, Violation};
use crate::models::question::{ChapterResult, Difficulty, OptionLetter, Question};
use crate::utils::text::normalize_for_compare;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Runs every integrity rule against a chapter. Violations are collected in
/// rule order; the chapter passes only when none are found.
pub fn validate_chapter(chapter: &ChapterResult, settings: &GameSettings) -> Result<(), ValidationError> {
    let mut report = Report::default();
    let questions = &chapter.questions;

    check_question_count(questions, settings, &mut report);
    check_options_count(questions, settings, &mut report);
    check_correct_option(questions, &mut report);
    check_duplicate_questions(questions, &mut report);
    check_difficulty_distribution(questions, settings, &mut report);
    check_difficulty_rating(questions, settings, &mut report);
    check_empty_options(questions, &mut report);
    check_duplicate_options(questions, &mut report);
    check_explanations(questions, settings, &mut report);
    check_metadata(questions, settings, chapter.num_chunks, &mut report);

    match ValidationError::new(report.violations) {
        None => {
            tracing::debug!(chapter_id = %chapter.chapter_id, "Chapter passed validation");
            Ok(())
        }
        Some(err) => {
            tracing::warn!(
                chapter_id = %chapter.chapter_id,
                rule = %err.rule(),
                violations = err.violations().len(),
                "Chapter failed validation"
            );
            Err(err)
        }
    }
}

#[derive(Default)]
struct Report {
    violations: Vec<Violation>,
}

impl Report {
    fn push(&mut self, rule: Rule, message: String) {
        self.violations.push(Violation { rule, message });
    }
}

fn check_question_count(questions: &[Question], settings: &GameSettings, report: &mut Report) {
    if questions.len() != settings.questions_per_chapter {
        report.push(
            Rule::QuestionCount,
            format!(
                "expected {} questions, got {}",
                settings.questions_per_chapter,
                questions.len()
            ),
        );
    }
}

fn check_options_count(questions: &[Question], settings: &GameSettings, report: &mut Report) {
    let expected: BTreeSet<OptionLetter> = OptionLetter::ALL.into_iter().collect();
    for q in questions {
        if !q.unknown_option_ids.is_empty() {
            for unknown in &q.unknown_option_ids {
                report.push(
                    Rule::OptionsCount,
                    format!("{}: option id '{}' is not one of A, B, C, D", q.id, unknown),
                );
            }
            continue;
        }
        if q.options.len() != settings.options_per_question {
            report.push(
                Rule::OptionsCount,
                format!(
                    "{}: expected {} options, got {}",
                    q.id,
                    settings.options_per_question,
                    q.options.len()
                ),
            );
            continue;
        }
        let letters: BTreeSet<OptionLetter> = q.options.iter().map(|o| o.letter).collect();
        if letters != expected {
            report.push(
                Rule::OptionsCount,
                format!("{}: option ids must be exactly A, B, C, D", q.id),
            );
        }
    }
}

fn check_correct_option(questions: &[Question], report: &mut Report) {
    for q in questions {
        if q.option(q.correct_option).is_none() {
            report.push(
                Rule::CorrectOption,
                format!("{}: correct option {} is not one of its options", q.id, q.correct_option),
            );
        }
    }
}

fn check_duplicate_questions(questions: &[Question], report: &mut Report) {
    let mut seen: HashSet<String> = HashSet::new();
    for q in questions {
        if !seen.insert(normalize_for_compare(&q.question)) {
            report.push(Rule::DuplicateQuestion, format!("{}: duplicate question text", q.id));
        }
    }
}

fn check_difficulty_distribution(questions: &[Question], settings: &GameSettings, report: &mut Report) {
    let mut actual: BTreeMap<Difficulty, usize> = BTreeMap::new();
    for q in questions {
        *actual.entry(q.difficulty).or_insert(0) += 1;
    }
    let difficulties: BTreeSet<Difficulty> = settings
        .difficulty_distribution
        .keys()
        .chain(actual.keys())
        .copied()
        .collect();
    for difficulty in difficulties {
        let expected = settings.difficulty_distribution.get(&difficulty).copied().unwrap_or(0);
        let got = actual.get(&difficulty).copied().unwrap_or(0);
        if expected != got {
            report.push(
                Rule::DifficultyDistribution,
                format!("difficulty '{}': expected {}, got {}", difficulty, expected, got),
            );
        }
    }
}

fn check_difficulty_rating(questions: &[Question], settings: &GameSettings, report: &mut Report) {
    for q in questions {
        let band = settings.band_for(q.difficulty);
        let rating = q.difficulty_rating;
        if !settings.rating_range.contains(rating) {
            report.push(
                Rule::DifficultyRating,
                format!(
                    "{}: rating {} outside global range {}..={}",
                    q.id, rating, settings.rating_range.min, settings.rating_range.max
                ),
            );
        } else if !band.contains(rating) {
            report.push(
                Rule::DifficultyRating,
                format!(
                    "{}: rating {} outside {} band {}..={}",
                    q.id, rating, q.difficulty, band.min, band.max
                ),
            );
        }
    }
}

fn check_empty_options(questions: &[Question], report: &mut Report) {
    for q in questions {
        for option in q.options.iter().filter(|o| o.text.trim().is_empty()) {
            report.push(
                Rule::EmptyOption,
                format!("{}: option {} is empty", q.id, option.letter),
            );
        }
    }
}

fn check_duplicate_options(questions: &[Question], report: &mut Report) {
    for q in questions {
        let mut seen: HashSet<String> = HashSet::new();
        let duplicated = q
            .options
            .iter()
            .filter(|o| !o.text.trim().is_empty())
            .any(|o| !seen.insert(normalize_for_compare(&o.text)));
        if duplicated {
            report.push(Rule::DuplicateOption, format!("{}: duplicate option text", q.id));
        }
    }
}

fn check_explanations(questions: &[Question], settings: &GameSettings, report: &mut Report) {
    for q in questions {
        let length = q.explanation.trim().chars().count();
        if length < settings.min_explanation_chars.max(1) {
            report.push(
                Rule::Explanation,
                format!(
                    "{}: explanation has {} chars, minimum is {}",
                    q.id, length, settings.min_explanation_chars
                ),
            );
        }
    }
}

fn check_metadata(questions: &[Question], settings: &GameSettings, num_chunks: usize, report: &mut Report) {
    let solve = settings.solve_time_range;
    for q in questions {
        match q.min_solve_time_seconds {
            None => report.push(Rule::QuestionMetadata, format!("{}: missing min_solve_time_seconds", q.id)),
            Some(secs) if secs < 0 => report.push(
                Rule::QuestionMetadata,
                format!("{}: min_solve_time_seconds {} is negative", q.id, secs),
            ),
            Some(secs) if !solve.contains(secs) => report.push(
                Rule::QuestionMetadata,
                format!(
                    "{}: min_solve_time_seconds {} outside {}..={}",
                    q.id, secs, solve.min, solve.max
                ),
            ),
            Some(_) => {}
        }
        match q.source_chunk_index {
            None => report.push(Rule::QuestionMetadata, format!("{}: missing source_chunk_index", q.id)),
            Some(idx) if idx < 0 => report.push(
                Rule::QuestionMetadata,
                format!("{}: source_chunk_index {} is negative", q.id, idx),
            ),
            Some(idx) if idx as usize >= num_chunks => report.push(
                Rule::QuestionMetadata,
                format!(
                    "{}: source_chunk_index {} out of range for {} chunks",
                    q.id, idx, num_chunks
                ),
            ),
            Some(_) => {}
        }
    }
}
