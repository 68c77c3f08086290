use crate::error::{Error, Result};
use crate::models::question::Difficulty;
use dotenvy::dotenv;
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_CHAPTER_TITLES: [(&str, &str); 4] = [
    ("1", "Artificial Intelligence, Machine Learning, and Deep Learning"),
    ("2", "Natural Language Processing and Large Language Models"),
    ("3", "Agentic Cybersecurity"),
    ("4", "Bitcoin Vocabulary"),
];

/// Inclusive integer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: i64,
    pub max: i64,
}

impl Bounds {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model_name: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 4096,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(2000),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PdfSettings {
    pub allowed_directory: PathBuf,
    pub max_size_bytes: u64,
    pub min_text_chars: usize,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            allowed_directory: PathBuf::from("./documents"),
            max_size_bytes: 50 * 1024 * 1024,
            min_text_chars: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub questions_per_chapter: usize,
    pub options_per_question: usize,
    pub difficulty_distribution: BTreeMap<Difficulty, usize>,
    pub difficulty_bands: BTreeMap<Difficulty, Bounds>,
    pub rating_range: Bounds,
    pub solve_time_range: Bounds,
    /// Maximum number of questions per chapter whose answer sits on the same letter.
    pub fairness_cap_per_letter: usize,
    pub min_explanation_chars: usize,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_sentences: usize,
    pub prompt_input_token_budget: usize,
    pub prompt_overhead_tokens: usize,
    pub max_concurrent_chapters: usize,
    pub chapter_attempts: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            questions_per_chapter: 5,
            options_per_question: 4,
            difficulty_distribution: BTreeMap::from([(Difficulty::Medium, 2), (Difficulty::Hard, 3)]),
            difficulty_bands: BTreeMap::from([
                (Difficulty::Medium, Bounds::new(450, 650)),
                (Difficulty::Hard, Bounds::new(651, 900)),
            ]),
            rating_range: Bounds::new(400, 1000),
            solve_time_range: Bounds::new(10, 300),
            fairness_cap_per_letter: 2,
            min_explanation_chars: 10,
            chunk_max_tokens: 1500,
            chunk_overlap_sentences: 2,
            prompt_input_token_budget: 6000,
            prompt_overhead_tokens: 1500,
            max_concurrent_chapters: 2,
            chapter_attempts: 1,
        }
    }
}

impl GameSettings {
    pub fn band_for(&self, difficulty: Difficulty) -> Bounds {
        self.difficulty_bands
            .get(&difficulty)
            .copied()
            .unwrap_or(self.rating_range)
    }

    /// Token budget left for source chunks once the prompt itself is paid for.
    pub fn chunk_token_budget(&self) -> usize {
        self.prompt_input_token_budget
            .saturating_sub(self.prompt_overhead_tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSource {
    pub id: String,
    pub title: String,
    pub pdf_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub app_name: String,
    pub version: String,
    pub llm: LlmSettings,
    pub pdf: PdfSettings,
    pub game: GameSettings,
    pub chapters: Vec<ChapterSource>,
    pub max_inflight_generations: usize,
    pub shuffle_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let pdf = PdfSettings::default();
        let chapters = default_chapters(&pdf.allowed_directory);
        Self {
            server_address: "0.0.0.0:8000".to_string(),
            app_name: "Game Maker Agent".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            llm: LlmSettings::default(),
            pdf,
            game: GameSettings::default(),
            chapters,
            max_inflight_generations: 2,
            shuffle_seed: None,
        }
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let defaults = Config::default();

        let api_key = env::var("LLM_API_KEY")
            .or_else(|_| env::var("GROQ_API_KEY"))
            .unwrap_or_default();

        let llm = LlmSettings {
            api_key,
            base_url: get_env_or("LLM_BASE_URL", &defaults.llm.base_url),
            model_name: get_env_or("LLM_MODEL_NAME", &defaults.llm.model_name),
            temperature: get_env_parse_or("LLM_TEMPERATURE", defaults.llm.temperature)?,
            top_p: get_env_parse_or("LLM_TOP_P", defaults.llm.top_p)?,
            max_tokens: get_env_parse_or("LLM_MAX_TOKENS", defaults.llm.max_tokens)?,
            max_retries: get_env_parse_or("LLM_MAX_RETRIES", defaults.llm.max_retries)?,
            retry_base_delay: Duration::from_millis(get_env_parse_or(
                "LLM_RETRY_BASE_DELAY_MS",
                defaults.llm.retry_base_delay.as_millis() as u64,
            )?),
            timeout: Duration::from_secs(get_env_parse_or(
                "LLM_TIMEOUT_SECS",
                defaults.llm.timeout.as_secs(),
            )?),
        };

        let pdf = PdfSettings {
            allowed_directory: env::var("PDF_ALLOWED_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or(defaults.pdf.allowed_directory),
            max_size_bytes: get_env_parse_or("PDF_MAX_SIZE_BYTES", defaults.pdf.max_size_bytes)?,
            min_text_chars: defaults.pdf.min_text_chars,
        };

        let mut game = defaults.game;
        game.fairness_cap_per_letter =
            get_env_parse_or("FAIRNESS_CAP_PER_LETTER", game.fairness_cap_per_letter)?;
        let medium = game.band_for(Difficulty::Medium);
        let hard = game.band_for(Difficulty::Hard);
        let medium = Bounds::new(
            get_env_parse_or("MEDIUM_RATING_MIN", medium.min)?,
            get_env_parse_or("MEDIUM_RATING_MAX", medium.max)?,
        );
        let hard = Bounds::new(
            get_env_parse_or("HARD_RATING_MIN", hard.min)?,
            get_env_parse_or("HARD_RATING_MAX", hard.max)?,
        );
        game.difficulty_bands.insert(Difficulty::Medium, medium);
        game.difficulty_bands.insert(Difficulty::Hard, hard);
        game.chunk_max_tokens = get_env_parse_or("CHUNK_MAX_TOKENS", game.chunk_max_tokens)?;
        game.chunk_overlap_sentences =
            get_env_parse_or("CHUNK_OVERLAP_SENTENCES", game.chunk_overlap_sentences)?;
        game.prompt_input_token_budget =
            get_env_parse_or("PROMPT_INPUT_TOKEN_BUDGET", game.prompt_input_token_budget)?;
        game.max_concurrent_chapters =
            get_env_parse_or("MAX_CONCURRENT_CHAPTERS", game.max_concurrent_chapters)?;
        game.chapter_attempts = get_env_parse_or("CHAPTER_ATTEMPTS", game.chapter_attempts)?;

        let chapters = DEFAULT_CHAPTER_TITLES
            .iter()
            .map(|(id, title)| ChapterSource {
                id: id.to_string(),
                title: get_env_or(&format!("CHAPTER_{}_TITLE", id), title),
                pdf_path: env::var(format!("CHAPTER_{}_PDF", id))
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_pdf_path(&pdf.allowed_directory, id)),
            })
            .collect();

        let config = Self {
            server_address: get_env_or("SERVER_ADDRESS", &defaults.server_address),
            app_name: get_env_or("APP_NAME", &defaults.app_name),
            version: defaults.version,
            llm,
            pdf,
            game,
            chapters,
            max_inflight_generations: get_env_parse_or(
                "MAX_INFLIGHT_GENERATIONS",
                defaults.max_inflight_generations,
            )?,
            shuffle_seed: get_env_parse_opt("SHUFFLE_SEED")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn total_questions(&self) -> usize {
        self.chapters.len() * self.game.questions_per_chapter
    }

    pub fn validate(&self) -> Result<()> {
        let game = &self.game;
        if self.chapters.is_empty() {
            return Err(Error::Config("At least one chapter must be configured".to_string()));
        }
        let unique: HashSet<&str> = self.chapters.iter().map(|c| c.id.as_str()).collect();
        if unique.len() != self.chapters.len() {
            return Err(Error::Config("Chapter ids must be unique".to_string()));
        }
        if game.options_per_question != 4 {
            return Err(Error::Config(format!(
                "Options per question must be 4 (A-D), got {}",
                game.options_per_question
            )));
        }
        let capacity = game.fairness_cap_per_letter * game.options_per_question;
        if game.questions_per_chapter > capacity {
            return Err(Error::Config(format!(
                "FAIRNESS_CAP_PER_LETTER={} cannot cover {} questions per chapter",
                game.fairness_cap_per_letter, game.questions_per_chapter
            )));
        }
        let distributed: usize = game.difficulty_distribution.values().sum();
        if distributed != game.questions_per_chapter {
            return Err(Error::Config(format!(
                "Difficulty distribution covers {} questions, expected {}",
                distributed, game.questions_per_chapter
            )));
        }
        for (difficulty, band) in &game.difficulty_bands {
            if band.min > band.max {
                return Err(Error::Config(format!(
                    "Rating band for '{}' is inverted: {}..{}",
                    difficulty, band.min, band.max
                )));
            }
        }
        if game.max_concurrent_chapters == 0 || self.max_inflight_generations == 0 {
            return Err(Error::Config("Concurrency limits must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn default_chapters(allowed_directory: &std::path::Path) -> Vec<ChapterSource> {
    DEFAULT_CHAPTER_TITLES
        .iter()
        .map(|(id, title)| ChapterSource {
            id: id.to_string(),
            title: title.to_string(),
            pdf_path: default_pdf_path(allowed_directory, id),
        })
        .collect()
}

fn default_pdf_path(allowed_directory: &std::path::Path, chapter_id: &str) -> PathBuf {
    allowed_directory.join(format!("chapter{}.pdf", chapter_id))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(get_env_parse_opt(name)?.unwrap_or(default))
}

fn get_env_parse_opt<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_questions(), 20);
        assert_eq!(config.chapters.len(), 4);
        assert_eq!(config.chapters[0].pdf_path, PathBuf::from("./documents/chapter1.pdf"));
    }

    #[test]
    fn cap_too_small_is_rejected() {
        let mut config = Config::default();
        config.game.fairness_cap_per_letter = 1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn distribution_must_cover_every_question() {
        let mut config = Config::default();
        config.game.difficulty_distribution.insert(Difficulty::Hard, 4);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn band_lookup_falls_back_to_global_range() {
        let mut game = GameSettings::default();
        assert_eq!(game.band_for(Difficulty::Hard), Bounds::new(651, 900));
        game.difficulty_bands.clear();
        assert_eq!(game.band_for(Difficulty::Hard), Bounds::new(400, 1000));
        assert_eq!(game.chunk_token_budget(), 4500);
    }
}
