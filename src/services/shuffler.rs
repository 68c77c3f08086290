use crate::config::GameSettings;
use crate::error::ShuffleError;
use crate::models::question::{OptionLetter, Question, QuestionOption};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Redistributes the correct answer of each question in a chapter across
/// A-D so that no letter is correct more than `cap` times.
#[derive(Debug, Clone, Copy)]
pub struct Shuffler {
    cap: usize,
}

impl Shuffler {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn from_settings(settings: &GameSettings) -> Self {
        Self::new(settings.fairness_cap_per_letter)
    }

    /// Draws `count` target letters from a multiset holding every letter
    /// `cap` times, so the result never exceeds the cap.
    pub fn target_letters<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<OptionLetter>, ShuffleError> {
        if count > self.cap * OptionLetter::ALL.len() {
            return Err(ShuffleError::CapUnsatisfiable {
                questions: count,
                cap: self.cap,
            });
        }
        let mut pool: Vec<OptionLetter> = OptionLetter::ALL
            .iter()
            .flat_map(|letter| std::iter::repeat(*letter).take(self.cap))
            .collect();
        pool.shuffle(rng);
        pool.truncate(count);
        Ok(pool)
    }

    pub fn shuffle_chapter<R: Rng + ?Sized>(
        &self,
        questions: &mut [Question],
        rng: &mut R,
    ) -> Result<(), ShuffleError> {
        for q in questions.iter() {
            check_shape(q)?;
        }

        let targets = self.target_letters(questions.len(), rng)?;
        for (q, target) in questions.iter_mut().zip(targets) {
            reorder_options(q, target, rng);
        }

        let counts = correct_letter_counts(questions);
        tracing::debug!(distribution = ?counts, cap = self.cap, "Post-shuffle correct answer distribution");
        Ok(())
    }
}

fn check_shape(q: &Question) -> Result<(), ShuffleError> {
    let malformed = |reason: String| ShuffleError::MalformedQuestion {
        question_id: q.id.clone(),
        reason,
    };
    if q.options.len() != OptionLetter::ALL.len() {
        return Err(malformed(format!(
            "expected {} options, found {}",
            OptionLetter::ALL.len(),
            q.options.len()
        )));
    }
    let correct = q
        .options
        .iter()
        .filter(|o| o.letter == q.correct_option)
        .count();
    if correct != 1 {
        return Err(malformed(format!(
            "correct option {} must name exactly one option, matched {}",
            q.correct_option, correct
        )));
    }
    Ok(())
}

/// Places the correct text under `target` and the distractors, in random
/// order, under the remaining letters.
fn reorder_options<R: Rng + ?Sized>(q: &mut Question, target: OptionLetter, rng: &mut R) {
    let options = std::mem::take(&mut q.options);
    let (correct, mut distractors): (Vec<QuestionOption>, Vec<QuestionOption>) = options
        .into_iter()
        .partition(|o| o.letter == q.correct_option);
    distractors.shuffle(rng);

    let mut correct_text = correct.into_iter().map(|o| o.text);
    let mut distractor_texts = distractors.into_iter().map(|o| o.text);
    q.options = OptionLetter::ALL
        .iter()
        .filter_map(|letter| {
            let text = if *letter == target {
                correct_text.next()
            } else {
                distractor_texts.next()
            }?;
            Some(QuestionOption { letter: *letter, text })
        })
        .collect();
    q.correct_option = target;
}

pub fn correct_letter_counts(questions: &[Question]) -> BTreeMap<OptionLetter, usize> {
    let mut counts: BTreeMap<OptionLetter, usize> =
        OptionLetter::ALL.iter().map(|l| (*l, 0)).collect();
    for q in questions {
        *counts.entry(q.correct_option).or_insert(0) += 1;
    }
    counts
}
