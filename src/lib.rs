pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod utils;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::{
    game_service::GameService,
    llm_generator::{LlmQuestionAuthor, QuestionAuthor},
    pdf_loader::{PdfTextSource, TextSource},
};
use reqwest::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game_service: GameService,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.llm.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let text_source = Arc::new(PdfTextSource::new(config.pdf.clone()));
        let author = Arc::new(LlmQuestionAuthor::new(
            http_client,
            config.llm.clone(),
            config.game.clone(),
        ));
        Ok(Self::with_collaborators(config, text_source, author))
    }

    /// Builds the state around caller-supplied text source and question author.
    pub fn with_collaborators(
        config: Config,
        text_source: Arc<dyn TextSource>,
        author: Arc<dyn QuestionAuthor>,
    ) -> Self {
        let config = Arc::new(config);
        let game_service = GameService::new(config.clone(), text_source, author);
        Self {
            config,
            game_service,
        }
    }
}
