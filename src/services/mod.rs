pub mod chunker;
pub mod formatter;
pub mod game_service;
pub mod llm_generator;
pub mod pdf_loader;
pub mod shuffler;
pub mod validator;
