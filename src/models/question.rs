use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionLetter::A => "A",
            OptionLetter::B => "B",
            OptionLetter::C => "C",
            OptionLetter::D => "D",
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionLetter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(OptionLetter::A),
            "B" => Ok(OptionLetter::B),
            "C" => Ok(OptionLetter::C),
            "D" => Ok(OptionLetter::D),
            other => Err(format!("unknown option id '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(rename = "option_id")]
    pub letter: OptionLetter,
    pub text: String,
}

/// A generated question before the public/private split.
///
/// Solve time and chunk index stay optional because the model may omit them;
/// the validator rejects such questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub chapter_id: String,
    pub chapter_title: String,
    pub question: String,
    pub options: Vec<QuestionOption>,
    pub correct_option: OptionLetter,
    pub difficulty: Difficulty,
    pub difficulty_rating: i64,
    pub min_solve_time_seconds: Option<i64>,
    pub source_chunk_index: Option<i64>,
    pub explanation: String,
    /// Option ids outside A-D as sent by the model. Their options are not in
    /// `options`; the validator reports them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_option_ids: Vec<String>,
}

impl Question {
    pub fn option(&self, letter: OptionLetter) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.letter == letter)
    }

    pub fn correct_text(&self) -> Option<&str> {
        self.option(self.correct_option).map(|o| o.text.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterResult {
    pub chapter_id: String,
    pub chapter_title: String,
    pub questions: Vec<Question>,
    /// Number of source chunks the questions were authored from.
    pub num_chunks: usize,
}
