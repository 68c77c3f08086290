use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the text source. Messages carry filesystem paths and must
/// only be logged, never returned to clients.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("access denied: {} is outside the allowed directory", .path.display())]
    OutsideAllowedDirectory { path: PathBuf },

    #[error("document not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("not a regular file: {}", .path.display())]
    NotAFile { path: PathBuf },

    #[error("not a PDF document: {}", .path.display())]
    NotPdf { path: PathBuf },

    #[error("document too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("document text too short ({chars} chars), extraction may have failed")]
    TooShort { chars: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    /// Path-free description suitable for an HTTP response.
    pub fn public_reason(&self) -> &'static str {
        match self {
            DocumentError::OutsideAllowedDirectory { .. } => "document location not allowed",
            DocumentError::NotFound { .. } => "document missing",
            DocumentError::NotAFile { .. } | DocumentError::NotPdf { .. } => {
                "document is not a PDF file"
            }
            DocumentError::TooLarge { .. } => "document exceeds size limit",
            DocumentError::Extraction(_) | DocumentError::TooShort { .. } => {
                "document text could not be extracted"
            }
            DocumentError::Io(_) => "document could not be read",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkingError {
    #[error("no extractable text to chunk")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("rate limited by model provider after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    #[error("model provider rejected the API key")]
    Unauthorized,

    #[error("model request failed after {attempts} attempt(s): {message}")]
    Model { attempts: u32, message: String },

    #[error("model returned invalid output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ShuffleError {
    #[error("question {question_id} is malformed: {reason}")]
    MalformedQuestion { question_id: String, reason: String },

    #[error("fairness cap of {cap} per letter cannot cover {questions} questions")]
    CapUnsatisfiable { questions: usize, cap: usize },
}

/// Identifier of a chapter integrity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    QuestionCount,
    OptionsCount,
    CorrectOption,
    DuplicateQuestion,
    DifficultyDistribution,
    DifficultyRating,
    EmptyOption,
    DuplicateOption,
    Explanation,
    QuestionMetadata,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::QuestionCount => "question_count",
            Rule::OptionsCount => "options_count",
            Rule::CorrectOption => "correct_option",
            Rule::DuplicateQuestion => "duplicate_question",
            Rule::DifficultyDistribution => "difficulty_distribution",
            Rule::DifficultyRating => "difficulty_rating",
            Rule::EmptyOption => "empty_option",
            Rule::DuplicateOption => "duplicate_option",
            Rule::Explanation => "explanation",
            Rule::QuestionMetadata => "question_metadata",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub rule: Rule,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Rejection of a chapter by the validator. Never empty.
#[derive(Debug, Clone)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    /// Rule of the first violation, in rule order.
    pub fn rule(&self) -> Rule {
        self.violations[0].rule
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn has_rule(&self, rule: Rule) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "validation failed with {} violation(s), first: {}",
            self.violations.len(),
            self.violations[0]
        )
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Chapter {chapter_id}: {source}")]
    Document {
        chapter_id: String,
        source: DocumentError,
    },

    #[error("Chapter {chapter_id}: {source}")]
    Chunking {
        chapter_id: String,
        source: ChunkingError,
    },

    #[error("Chapter {chapter_id}: {source}")]
    Generation {
        chapter_id: String,
        source: GenerationError,
    },

    #[error("Chapter {chapter_id}: {source}")]
    Shuffle {
        chapter_id: String,
        source: ShuffleError,
    },

    #[error("Chapter {chapter_id}: {source}")]
    ChapterValidation {
        chapter_id: String,
        source: ValidationError,
    },

    #[error("Formatting error: {0}")]
    Formatting(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn chapter_id(&self) -> Option<&str> {
        match self {
            Error::Document { chapter_id, .. }
            | Error::Chunking { chapter_id, .. }
            | Error::Generation { chapter_id, .. }
            | Error::Shuffle { chapter_id, .. }
            | Error::ChapterValidation { chapter_id, .. } => Some(chapter_id),
            _ => None,
        }
    }

    /// True when asking the model again could produce an acceptable chapter.
    pub fn is_regenerable(&self) -> bool {
        matches!(
            self,
            Error::Shuffle { .. }
                | Error::ChapterValidation { .. }
                | Error::Generation {
                    source: GenerationError::InvalidOutput(_),
                    ..
                }
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let chapter_id = self.chapter_id().map(str::to_string);
        let mut rule: Option<&'static str> = None;
        let mut violations: Option<Vec<Violation>> = None;

        let (status, error_message) = match &self {
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", err)),
            Error::Document { chapter_id, source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "Chapter {}: source document unavailable ({})",
                    chapter_id,
                    source.public_reason()
                ),
            ),
            Error::Chunking { chapter_id, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Chapter {}: source document has no usable text", chapter_id),
            ),
            Error::Generation { chapter_id, source } => match source {
                GenerationError::RateLimited { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!(
                        "Chapter {}: model provider rate limit exceeded, retry later",
                        chapter_id
                    ),
                ),
                GenerationError::Unauthorized => (
                    StatusCode::BAD_GATEWAY,
                    format!(
                        "Chapter {}: model provider rejected the configured API key",
                        chapter_id
                    ),
                ),
                other => (
                    StatusCode::BAD_GATEWAY,
                    format!("Chapter {}: question generation failed: {}", chapter_id, other),
                ),
            },
            Error::Shuffle { chapter_id, source } => {
                rule = Some("malformed_question");
                (
                    StatusCode::BAD_GATEWAY,
                    format!("Chapter {}: {}", chapter_id, source),
                )
            }
            Error::ChapterValidation { chapter_id, source } => {
                rule = Some(source.rule().as_str());
                violations = Some(source.violations().to_vec());
                (
                    StatusCode::BAD_GATEWAY,
                    format!(
                        "Chapter {} failed validation rule '{}': {}",
                        chapter_id,
                        source.rule(),
                        source.violations()[0].message
                    ),
                )
            }
            Error::Formatting(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Game generation failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Rejected request");
        }

        let mut body = json!({ "status": "error", "error": error_message });
        if let Some(chapter_id) = chapter_id {
            body["chapter_id"] = json!(chapter_id);
        }
        if let Some(rule) = rule {
            body["rule"] = json!(rule);
        }
        if let Some(violations) = violations {
            body["violations"] = json!(violations);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value as JsonValue;
    use validator::Validate;

    async fn render(err: Error) -> (StatusCode, JsonValue) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[derive(Validate)]
    struct Target {
        #[validate(range(min = 400, max = 1000))]
        value: i64,
    }

    #[tokio::test]
    async fn request_errors_are_bad_requests() {
        let invalid = Target { value: 1500 }.validate().unwrap_err();
        let (status, body) = render(Error::from(invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let malformed = serde_json::from_str::<JsonValue>("{").unwrap_err();
        let (status, body) = render(Error::from(malformed)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn internal_failures_hide_their_detail() {
        let (status, body) = render(Error::Internal("chapter task failed: boom".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An unexpected error occurred");

        let (status, body) = render(Error::Document {
            chapter_id: "2".into(),
            source: DocumentError::NotFound {
                path: PathBuf::from("/srv/books/chapter2.pdf"),
            },
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["chapter_id"], "2");
        assert!(!body["error"].as_str().unwrap().contains("/srv/books"));
    }

    #[tokio::test]
    async fn rate_limits_and_rule_failures_keep_their_status() {
        let (status, _) = render(Error::Generation {
            chapter_id: "1".into(),
            source: GenerationError::RateLimited { attempts: 3 },
        })
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let source = ValidationError::new(vec![Violation {
            rule: Rule::OptionsCount,
            message: "ch1_q01: expected 4 options, got 3".into(),
        }])
        .unwrap();
        let (status, body) = render(Error::ChapterValidation {
            chapter_id: "1".into(),
            source,
        })
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["rule"], "options_count");
        assert_eq!(body["violations"].as_array().unwrap().len(), 1);
    }
}
