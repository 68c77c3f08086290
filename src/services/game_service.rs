use crate::config::{ChapterSource, Config};
use crate::error::{Error, Result};
use crate::models::game::GamePayload;
use crate::models::question::ChapterResult;
use crate::services::chunker::Chunker;
use crate::services::formatter::format_game;
use crate::services::llm_generator::{AuthorRequest, QuestionAuthor};
use crate::services::pdf_loader::TextSource;
use crate::services::shuffler::Shuffler;
use crate::services::validator::validate_chapter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Runs the per-chapter pipelines and assembles the game.
#[derive(Clone)]
pub struct GameService {
    config: Arc<Config>,
    text_source: Arc<dyn TextSource>,
    author: Arc<dyn QuestionAuthor>,
    chunker: Chunker,
    shuffler: Shuffler,
}

impl GameService {
    pub fn new(config: Arc<Config>, text_source: Arc<dyn TextSource>, author: Arc<dyn QuestionAuthor>) -> Self {
        let chunker = Chunker::from_settings(&config.game);
        let shuffler = Shuffler::from_settings(&config.game);
        Self {
            config,
            text_source,
            author,
            chunker,
            shuffler,
        }
    }

    pub async fn generate_game(&self, difficulty_target: u32) -> Result<GamePayload> {
        let started = Instant::now();
        tracing::info!(
            difficulty_target,
            chapters = self.config.chapters.len(),
            "Starting game generation"
        );

        let permits = Arc::new(Semaphore::new(self.config.game.max_concurrent_chapters.max(1)));
        let mut tasks = JoinSet::new();
        for (index, chapter) in self.config.chapters.iter().cloned().enumerate() {
            let service = self.clone();
            let permits = permits.clone();
            let span = tracing::info_span!("chapter", chapter_id = %chapter.id);
            tasks.spawn(
                async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| Error::Internal("chapter limiter closed".to_string()))?;
                    let result = service.run_chapter(index, &chapter, difficulty_target).await?;
                    Ok::<_, Error>((index, result))
                }
                .instrument(span),
            );
        }

        let mut results = Vec::with_capacity(self.config.chapters.len());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| Error::Internal(format!("chapter task failed: {}", e)));
            match outcome.and_then(|r| r) {
                Ok(result) => results.push(result),
                Err(err) => {
                    tasks.abort_all();
                    tracing::error!(
                        chapter_id = err.chapter_id().unwrap_or("-"),
                        error = %err,
                        "Chapter failed, aborting remaining chapters"
                    );
                    return Err(err);
                }
            }
        }
        results.sort_by_key(|(index, _)| *index);
        let chapters: Vec<ChapterResult> = results.into_iter().map(|(_, result)| result).collect();

        tracing::info!(chapters = chapters.len(), "All chapters validated, formatting game");
        let payload = format_game(&chapters, difficulty_target, &self.config)?;

        tracing::info!(
            total_questions = payload.meta.total_questions,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Game generated"
        );
        Ok(payload)
    }

    async fn run_chapter(&self, index: usize, chapter: &ChapterSource, difficulty_target: u32) -> Result<ChapterResult> {
        tracing::info!(title = %chapter.title, "Chapter pipeline started");

        let text = self
            .text_source
            .extract(chapter)
            .await
            .map_err(|source| Error::Document {
                chapter_id: chapter.id.clone(),
                source,
            })?;
        tracing::debug!(chars = text.len(), "Chapter text loaded");

        let chunks = self.chunker.chunk(&text).map_err(|source| Error::Chunking {
            chapter_id: chapter.id.clone(),
            source,
        })?;
        let selected = self
            .chunker
            .select_within_budget(&chunks, self.config.game.chunk_token_budget());
        tracing::debug!(chunks = chunks.len(), selected = selected.len(), "Chapter chunked");

        let mut rng = self.chapter_rng(index);
        let attempts = self.config.game.chapter_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .author_chapter(chapter, &selected, difficulty_target, &mut rng)
                .await
            {
                Ok(result) => {
                    tracing::info!(attempt, "Chapter validated");
                    return Ok(result);
                }
                Err(err) if err.is_regenerable() && attempt < attempts => {
                    tracing::warn!(attempt, error = %err, "Chapter rejected, regenerating");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One authoring round: generate, structural check, shuffle, final check.
    async fn author_chapter(
        &self,
        chapter: &ChapterSource,
        chunks: &[String],
        difficulty_target: u32,
        rng: &mut StdRng,
    ) -> Result<ChapterResult> {
        let request = AuthorRequest {
            chapter_id: chapter.id.clone(),
            chapter_title: chapter.title.clone(),
            chunks: chunks.to_vec(),
            difficulty_target,
        };
        let questions = self
            .author
            .generate(request)
            .await
            .map_err(|source| Error::Generation {
                chapter_id: chapter.id.clone(),
                source,
            })?;
        tracing::debug!(questions = questions.len(), "Questions generated");

        let mut result = ChapterResult {
            chapter_id: chapter.id.clone(),
            chapter_title: chapter.title.clone(),
            questions,
            num_chunks: chunks.len(),
        };

        let rejected = |source| Error::ChapterValidation {
            chapter_id: chapter.id.clone(),
            source,
        };
        validate_chapter(&result, &self.config.game).map_err(rejected)?;
        self.shuffler
            .shuffle_chapter(&mut result.questions, rng)
            .map_err(|source| Error::Shuffle {
                chapter_id: chapter.id.clone(),
                source,
            })?;
        validate_chapter(&result, &self.config.game).map_err(rejected)?;
        Ok(result)
    }

    fn chapter_rng(&self, index: usize) -> StdRng {
        match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        }
    }
}
