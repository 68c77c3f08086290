use crate::config::{GameSettings, LlmSettings};
use crate::dto::llm_dto::{ChatCompletionResponse, LlmGenerationOutput, LlmQuestion};
use crate::error::GenerationError;
use crate::models::question::{OptionLetter, Question, QuestionOption};
use crate::utils::text::trunc_for_log;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Everything the author needs to write one chapter's questions.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorRequest {
    pub chapter_id: String,
    pub chapter_title: String,
    pub chunks: Vec<String>,
    pub difficulty_target: u32,
}

/// Writes candidate questions for a chapter from its source chunks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionAuthor: Send + Sync {
    async fn generate(&self, request: AuthorRequest) -> Result<Vec<Question>, GenerationError>;
}

/// OpenAI-compatible chat-completions client (Groq by default).
#[derive(Clone)]
pub struct LlmQuestionAuthor {
    client: Client,
    llm: LlmSettings,
    game: GameSettings,
}

#[async_trait]
impl QuestionAuthor for LlmQuestionAuthor {
    async fn generate(&self, request: AuthorRequest) -> Result<Vec<Question>, GenerationError> {
        let system = self.system_prompt();
        let user = self.user_prompt(&request);

        tracing::info!(
            chapter_id = %request.chapter_id,
            model = %self.llm.model_name,
            temperature = self.llm.temperature,
            chunks = request.chunks.len(),
            "Calling model"
        );
        let raw = self.chat_completion(&system, &user).await?;
        tracing::debug!(
            chapter_id = %request.chapter_id,
            chars = raw.len(),
            preview = %trunc_for_log(&raw, 300),
            "Model response received"
        );

        let questions = parse_generation(&raw, &request.chapter_id, &request.chapter_title)?;
        tracing::info!(
            chapter_id = %request.chapter_id,
            questions = questions.len(),
            "Parsed generated questions"
        );
        Ok(questions)
    }
}

impl LlmQuestionAuthor {
    pub fn new(client: Client, llm: LlmSettings, game: GameSettings) -> Self {
        Self { client, llm, game }
    }

    pub fn system_prompt(&self) -> String {
        let n = self.game.questions_per_chapter;
        let mut distribution = Vec::new();
        let mut first = 1;
        for (difficulty, count) in &self.game.difficulty_distribution {
            if *count == 0 {
                continue;
            }
            let band = self.game.band_for(*difficulty);
            let last = first + count - 1;
            distribution.push(format!(
                "- Questions {}-{}: difficulty \"{}\" (difficulty_rating {}-{})",
                first, last, difficulty, band.min, band.max
            ));
            first = last + 1;
        }

        format!(
            r#"You are an expert quiz generation engine for an educational game.

ABSOLUTE CONSTRAINTS:
1. Generate EXACTLY {n} multiple-choice questions.
2. Each question has EXACTLY 4 options labeled A, B, C, D.
3. EXACTLY 1 option per question is correct.
4. ALL questions and answers MUST come ONLY from the provided source text.
5. Do NOT use external knowledge or assumptions.
6. No two questions may test the same fact or concept.
7. No two options within a question may be semantically identical.
8. The correct answer MUST be unambiguously supported by the source text.

QUESTION STYLE:
- Test understanding, not memorization. Ask "why" and "how".
- Prefer short scenarios that require connecting concepts from the text.
- Wrong options must be plausible.
- Keep questions clear; do not make them convoluted.

DIFFICULTY DISTRIBUTION (MANDATORY):
{distribution}

DIFFICULTY GUIDELINES:
- medium: understanding relationships or comparing concepts. min_solve_time_seconds 30-60.
- hard: synthesis, inference or applying concepts to scenarios. min_solve_time_seconds 45-90.

OUTPUT FORMAT: return ONLY one JSON object, no markdown, no commentary:
{{
  "questions": [
    {{
      "question_number": 1,
      "question": "...",
      "options": [
        {{"option_id": "A", "text": "...", "is_correct": false}},
        {{"option_id": "B", "text": "...", "is_correct": true}},
        {{"option_id": "C", "text": "...", "is_correct": false}},
        {{"option_id": "D", "text": "...", "is_correct": false}}
      ],
      "difficulty": "medium",
      "difficulty_rating": 500,
      "min_solve_time_seconds": 40,
      "explanation": "According to the text: ...",
      "source_chunk_index": 0
    }}
  ]
}}"#,
            n = n,
            distribution = distribution.join("\n"),
        )
    }

    pub fn user_prompt(&self, request: &AuthorRequest) -> String {
        let sections: Vec<String> = request
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("--- SOURCE CHUNK {i} ---\n{chunk}\n--- END CHUNK {i} ---"))
            .collect();

        format!(
            "TASK: Generate exactly {n} MCQs from Chapter {id}: \"{title}\".\n\
             TARGET DIFFICULTY SCORE: {target}\n\
             NUMBER OF SOURCE CHUNKS: {count}\n\n\
             SOURCE TEXT (use ONLY this material):\n\n{chunks}\n\n\
             Generate the questions now as a single JSON object. Reference source_chunk_index \
             (0-{max_index}) for each question and make every answer directly supported by the text.",
            n = self.game.questions_per_chapter,
            id = request.chapter_id,
            title = request.chapter_title,
            target = request.difficulty_target,
            count = request.chunks.len(),
            chunks = sections.join("\n\n"),
            max_index = request.chunks.len().saturating_sub(1),
        )
    }

    /// Sends one chat completion, retrying rate limits, 5xx and transport
    /// failures with exponential backoff.
    async fn chat_completion(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.llm.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.llm.model_name,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.llm.temperature,
            "top_p": self.llm.top_p,
            "max_tokens": self.llm.max_tokens,
            "response_format": { "type": "json_object" }
        });

        let max_attempts = self.llm.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = self
                .client
                .post(&url)
                .bearer_auth(&self.llm.api_key)
                .json(&payload)
                .timeout(self.llm.timeout)
                .send()
                .await;

            let res = match sent {
                Ok(res) => res,
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(GenerationError::Model {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    let delay = self.backoff_delay(attempt, None);
                    tracing::warn!(attempt, error = %e, ?delay, "Model request failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = res.status();
            if status.is_success() {
                let body: ChatCompletionResponse = res
                    .json()
                    .await
                    .map_err(|e| GenerationError::InvalidOutput(format!("unreadable completion: {}", e)))?;
                if let Some(usage) = &body.usage {
                    tracing::info!(
                        prompt_tokens = ?usage.prompt_tokens,
                        completion_tokens = ?usage.completion_tokens,
                        total_tokens = ?usage.total_tokens,
                        "Model usage"
                    );
                }
                return body
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .filter(|content| !content.trim().is_empty())
                    .ok_or_else(|| GenerationError::InvalidOutput("model returned an empty response".to_string()));
            }

            if status == StatusCode::UNAUTHORIZED {
                return Err(GenerationError::Unauthorized);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            let retry_after = retry_after(&res);
            let body = res.text().await.unwrap_or_default();
            let message = format!(
                "HTTP {}: {}",
                status,
                extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200))
            );

            if !retryable {
                return Err(GenerationError::Model { attempts: attempt, message });
            }
            if attempt >= max_attempts {
                return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                    GenerationError::RateLimited { attempts: attempt }
                } else {
                    GenerationError::Model { attempts: attempt, message }
                });
            }

            let delay = self.backoff_delay(attempt, retry_after);
            tracing::warn!(attempt, status = status.as_u16(), ?delay, %message, "Model call throttled or failed, backing off");
            tokio::time::sleep(delay).await;
        }
    }

    /// `base × 2^(attempt-1)`, or the server's `Retry-After`, capped at a minute.
    fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = self
            .llm
            .retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        retry_after.unwrap_or(exponential).min(MAX_BACKOFF)
    }
}

fn retry_after(res: &reqwest::Response) -> Option<Duration> {
    res.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Delay-seconds form of `Retry-After`, capped at [`MAX_BACKOFF`].
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs.min(MAX_BACKOFF.as_secs_f64())).ok()
}

/// Pulls `error.message` out of an OpenAI-style error body.
fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Wrapper {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }
    serde_json::from_str::<Wrapper>(body).ok().map(|w| w.error.message)
}

/// Returns the JSON object inside a model reply, tolerating markdown fences
/// and surrounding chatter.
pub fn extract_json(raw: &str) -> &str {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    static OBJECT: OnceLock<Regex> = OnceLock::new();

    let fenced = FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap_or_else(|e| panic!("bad regex: {e}"))
    });
    if let Some(m) = fenced.captures(raw).and_then(|c| c.get(1)) {
        return m.as_str();
    }
    let object = OBJECT.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap_or_else(|e| panic!("bad regex: {e}")));
    object.find(raw).map(|m| m.as_str()).unwrap_or(raw)
}

/// Converts the model's JSON into chapter-scoped questions. Structural
/// problems the validator can name (option counts, duplicates, bounds) are
/// passed through; only unreadable output is rejected here.
pub fn parse_generation(raw: &str, chapter_id: &str, chapter_title: &str) -> Result<Vec<Question>, GenerationError> {
    let output: LlmGenerationOutput = serde_json::from_str(extract_json(raw)).map_err(|e| {
        tracing::error!(error = %e, raw = %trunc_for_log(raw, 500), "Model output is not valid question JSON");
        GenerationError::InvalidOutput(format!("output does not match the question schema: {}", e))
    })?;

    let mut raw_questions = output.questions;
    raw_questions.sort_by_key(|q| q.question_number.unwrap_or(u32::MAX));

    raw_questions
        .into_iter()
        .enumerate()
        .map(|(index, q)| convert_question(q, index + 1, chapter_id, chapter_title))
        .collect()
}

fn convert_question(
    raw: LlmQuestion,
    position: usize,
    chapter_id: &str,
    chapter_title: &str,
) -> Result<Question, GenerationError> {
    let id = format!("ch{}_q{:02}", chapter_id, position);

    let mut options = Vec::with_capacity(raw.options.len());
    let mut unknown_option_ids = Vec::new();
    // `None` marks a correct flag on an option whose id is not A-D.
    let mut correct: Vec<Option<OptionLetter>> = Vec::new();
    for option in raw.options {
        match option.option_id.parse::<OptionLetter>() {
            Ok(letter) => {
                if option.is_correct {
                    correct.push(Some(letter));
                }
                options.push(QuestionOption {
                    letter,
                    text: option.text,
                });
            }
            Err(reason) => {
                tracing::debug!(question_id = %id, %reason, "Model used an unknown option id");
                if option.is_correct {
                    correct.push(None);
                }
                unknown_option_ids.push(option.option_id);
            }
        }
    }

    let correct_option = match correct.as_slice() {
        [Some(only)] => *only,
        // Point at a letter the question lacks so the correct-option rule
        // fires alongside options_count.
        [None] => OptionLetter::ALL
            .into_iter()
            .find(|letter| options.iter().all(|o| o.letter != *letter))
            .unwrap_or(OptionLetter::A),
        _ => {
            return Err(GenerationError::InvalidOutput(format!(
                "{}: expected exactly one correct option, got {}",
                id,
                correct.len()
            )))
        }
    };

    Ok(Question {
        id,
        chapter_id: chapter_id.to_string(),
        chapter_title: chapter_title.to_string(),
        question: raw.question,
        options,
        correct_option,
        difficulty: raw.difficulty,
        difficulty_rating: raw.difficulty_rating,
        min_solve_time_seconds: raw.min_solve_time_seconds,
        source_chunk_index: raw.source_chunk_index,
        explanation: raw.explanation,
        unknown_option_ids,
    })
}
