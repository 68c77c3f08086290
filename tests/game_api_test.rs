use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use game_maker_backend::{
    config::{ChapterSource, Config},
    error::{DocumentError, GenerationError},
    models::question::{Difficulty, OptionLetter, Question, QuestionOption},
    routes,
    services::{
        llm_generator::{AuthorRequest, QuestionAuthor},
        pdf_loader::TextSource,
    },
    AppState,
};
use serde_json::{json, Value as JsonValue};
use tokio_test::assert_ok;
use tower::ServiceExt;

const CHAPTER_TEXT: &str = "Proof of work secures the ledger. Miners compete to find a valid nonce. \
    The difficulty adjusts every two thousand and sixteen blocks. Nodes verify every block they receive.";

struct FixedText {
    fail_chapter: Option<&'static str>,
}

#[async_trait]
impl TextSource for FixedText {
    async fn extract(&self, chapter: &ChapterSource) -> Result<String, DocumentError> {
        if self.fail_chapter == Some(chapter.id.as_str()) {
            return Err(DocumentError::NotFound {
                path: PathBuf::from("/srv/secret/documents").join(&chapter.pdf_path),
            });
        }
        Ok(CHAPTER_TEXT.to_string())
    }
}

type Tweak = fn(&str, &mut Vec<Question>) -> Result<(), GenerationError>;

/// Answers every chapter with five valid questions whose correct answer is
/// always B, then lets a test corrupt them.
struct ScriptedAuthor {
    calls: AtomicUsize,
    tweak: Tweak,
}

impl ScriptedAuthor {
    fn new(tweak: Tweak) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            tweak,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionAuthor for ScriptedAuthor {
    async fn generate(&self, request: AuthorRequest) -> Result<Vec<Question>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut questions: Vec<Question> = (1..=5)
            .map(|n| question(&request.chapter_id, &request.chapter_title, n))
            .collect();
        (self.tweak)(&request.chapter_id, &mut questions)?;
        Ok(questions)
    }
}

fn no_tweak(_: &str, _: &mut Vec<Question>) -> Result<(), GenerationError> {
    Ok(())
}

fn question(chapter_id: &str, chapter_title: &str, n: usize) -> Question {
    let (difficulty, rating) = if n <= 2 {
        (Difficulty::Medium, 480 + n as i64 * 50)
    } else {
        (Difficulty::Hard, 660 + n as i64 * 40)
    };
    Question {
        id: format!("ch{}_q{:02}", chapter_id, n),
        chapter_id: chapter_id.to_string(),
        chapter_title: chapter_title.to_string(),
        question: format!("Chapter {} question {}: why does the mechanism behave this way?", chapter_id, n),
        options: OptionLetter::ALL
            .iter()
            .map(|letter| QuestionOption {
                letter: *letter,
                text: format!("Answer {} to question {}", letter, n),
            })
            .collect(),
        correct_option: OptionLetter::B,
        difficulty,
        difficulty_rating: rating,
        min_solve_time_seconds: Some(40),
        source_chunk_index: Some(0),
        explanation: "The text states this directly in its opening paragraph.".to_string(),
        unknown_option_ids: Vec::new(),
    }
}

fn test_config() -> Config {
    Config {
        shuffle_seed: Some(2024),
        ..Config::default()
    }
}

fn app_with(text: FixedText, author: Arc<ScriptedAuthor>) -> Router {
    routes::router(AppState::with_collaborators(test_config(), Arc::new(text), author))
}

async fn post_game(app: Router, body: &'static str) -> (StatusCode, JsonValue) {
    let req = Request::builder()
        .method("POST")
        .uri("/generate-game")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, assert_ok!(serde_json::from_slice::<JsonValue>(&bytes)))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, JsonValue) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn generates_twenty_aligned_fair_puzzles() {
    let author = ScriptedAuthor::new(no_tweak);
    let app = app_with(FixedText { fail_chapter: None }, author.clone());

    let (status, body) = post_game(app, r#"{"difficulty_target": 800}"#).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    assert_eq!(author.calls(), 4);

    let game = &body["game"];
    assert_eq!(game["meta"]["total_questions"], 20);
    assert_eq!(game["meta"]["questions_per_chapter"], 5);
    assert_eq!(game["meta"]["difficulty_target"], 800);
    assert_eq!(game["meta"]["chapters"], json!(["1", "2", "3", "4"]));

    let public = game["public_puzzles"].as_array().unwrap();
    let private = game["private_answer_key"].as_array().unwrap();
    assert_eq!(public.len(), 20);
    assert_eq!(private.len(), 20);

    let mut per_chapter: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for (puzzle, key) in public.iter().zip(private) {
        assert_eq!(puzzle["puzzle_id"], key["puzzle_id"]);
        let anchor = key["anchor_string"].as_str().unwrap();
        let (id, letter) = anchor.split_once('|').unwrap();
        assert_eq!(id, key["puzzle_id"].as_str().unwrap());
        assert_eq!(letter, key["correct_option_id"].as_str().unwrap());

        let letters: Vec<&str> = puzzle["options"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["option_id"].as_str().unwrap())
            .collect();
        assert_eq!(letters, vec!["A", "B", "C", "D"]);

        *per_chapter
            .entry(key["chapter_id"].as_str().unwrap().to_string())
            .or_default()
            .entry(letter.to_string())
            .or_insert(0) += 1;
    }
    for (chapter, counts) in per_chapter {
        assert!(counts.values().all(|c| *c <= 2), "chapter {chapter}: {counts:?}");
    }

    let public_text = serde_json::to_string(public).unwrap();
    assert!(!public_text.contains("correct"));
    assert!(!public_text.contains("explanation"));
    assert!(!public_text.contains("anchor"));
}

#[tokio::test]
async fn empty_body_uses_default_target() {
    let app = app_with(FixedText { fail_chapter: None }, ScriptedAuthor::new(no_tweak));
    let (status, body) = post_game(app, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["game"]["meta"]["difficulty_target"], 700);
}

#[tokio::test]
async fn three_options_fail_with_options_count() {
    fn drop_option(chapter_id: &str, questions: &mut Vec<Question>) -> Result<(), GenerationError> {
        if chapter_id == "2" {
            questions[3].options.truncate(3);
        }
        Ok(())
    }
    let app = app_with(FixedText { fail_chapter: None }, ScriptedAuthor::new(drop_option));

    let (status, body) = post_game(app, "{}").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["chapter_id"], "2");
    assert_eq!(body["rule"], "options_count");
    assert!(body["error"].as_str().unwrap().contains("Chapter 2"));
    assert!(body.get("game").is_none());
}

#[tokio::test]
async fn unknown_option_id_fails_with_options_count() {
    fn rename_option(chapter_id: &str, questions: &mut Vec<Question>) -> Result<(), GenerationError> {
        if chapter_id == "3" {
            questions[0].options.pop();
            questions[0].unknown_option_ids.push("E".to_string());
        }
        Ok(())
    }
    let app = app_with(FixedText { fail_chapter: None }, ScriptedAuthor::new(rename_option));

    let (status, body) = post_game(app, "{}").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["chapter_id"], "3");
    assert_eq!(body["rule"], "options_count");
    assert!(body["error"].as_str().unwrap().contains("option id 'E'"));
}

#[tokio::test]
async fn out_of_range_target_is_rejected_before_generation() {
    let author = ScriptedAuthor::new(no_tweak);
    let app = app_with(FixedText { fail_chapter: None }, author.clone());

    let (status, body) = post_game(app, r#"{"difficulty_target": 1500}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(author.calls(), 0);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let author = ScriptedAuthor::new(no_tweak);
    let app = app_with(FixedText { fail_chapter: None }, author.clone());
    let (status, _) = post_game(app, r#"{"difficulty_target": "#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(author.calls(), 0);
}

#[tokio::test]
async fn duplicate_question_fails_whole_request() {
    fn duplicate(chapter_id: &str, questions: &mut Vec<Question>) -> Result<(), GenerationError> {
        if chapter_id == "3" {
            questions[2].question = questions[0].question.to_lowercase();
        }
        Ok(())
    }
    let app = app_with(FixedText { fail_chapter: None }, ScriptedAuthor::new(duplicate));

    let (status, body) = post_game(app, "{}").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["chapter_id"], "3");
    assert_eq!(body["rule"], "duplicate_question");
    assert!(body["violations"].as_array().is_some_and(|v| !v.is_empty()));
    assert!(body.get("game").is_none());
}

#[tokio::test]
async fn missing_document_does_not_leak_paths() {
    let app = app_with(FixedText { fail_chapter: Some("1") }, ScriptedAuthor::new(no_tweak));

    let (status, body) = post_game(app, "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["chapter_id"], "1");
    let message = body["error"].as_str().unwrap();
    assert!(!message.contains("/srv/secret"));
    assert!(!message.contains(".pdf"));
}

#[tokio::test]
async fn exhausted_rate_limit_is_service_unavailable() {
    fn throttled(_: &str, _: &mut Vec<Question>) -> Result<(), GenerationError> {
        Err(GenerationError::RateLimited { attempts: 4 })
    }
    let app = app_with(FixedText { fail_chapter: None }, ScriptedAuthor::new(throttled));
    let (status, body) = post_game(app, "{}").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn health_and_service_info() {
    let app = app_with(FixedText { fail_chapter: None }, ScriptedAuthor::new(no_tweak));

    let (status, body) = get_json(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "llama-3.3-70b-versatile");
    assert!(body["version"].is_string());

    let (status, body) = get_json(app.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "Game Maker Agent");
    assert_eq!(body["endpoints"]["generate_game"], "POST /generate-game");

    let (status, body) = get_json(app, "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/generate-game"].is_object());
}
