use crate::config::GameSettings;
use crate::error::ChunkingError;
use crate::utils::text::estimate_tokens;
use regex::Regex;
use std::sync::OnceLock;

/// A trailing chunk shorter than this is folded into the one before it.
const MIN_CHUNK_CHARS: usize = 100;

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").unwrap_or_else(|e| panic!("bad regex: {e}")))
}

fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([.!?])\s+(["A-Z])"#).unwrap_or_else(|e| panic!("bad regex: {e}"))
    })
}

/// Splits chapter text into overlapping, sentence-bounded chunks.
/// Deterministic: the same text always yields the same chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_tokens: usize,
    overlap_sentences: usize,
}

impl Chunker {
    pub fn new(max_tokens: usize, overlap_sentences: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            overlap_sentences,
        }
    }

    pub fn from_settings(settings: &GameSettings) -> Self {
        Self::new(settings.chunk_max_tokens, settings.chunk_overlap_sentences)
    }

    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ChunkingError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChunkingError::Empty);
        }

        let sentences: Vec<&str> = paragraph_break()
            .split(trimmed)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .flat_map(split_sentences)
            .collect();

        if sentences.is_empty() {
            tracing::warn!("No sentences detected, using whole text as a single chunk");
            return Ok(vec![trimmed.to_string()]);
        }

        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0usize;

        for sentence in sentences {
            let tokens = estimate_tokens(sentence);
            if current_tokens + tokens > self.max_tokens && !current.is_empty() {
                chunks.push(current.join(" "));
                if self.overlap_sentences > 0 && current.len() > self.overlap_sentences {
                    current = current.split_off(current.len() - self.overlap_sentences);
                    current_tokens = current.iter().map(|s| estimate_tokens(s)).sum();
                } else {
                    current.clear();
                    current_tokens = 0;
                }
            }
            current.push(sentence);
            current_tokens += tokens;
        }
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        if chunks.len() > 1 && chunks[chunks.len() - 1].chars().count() < MIN_CHUNK_CHARS {
            if let Some(last) = chunks.pop() {
                if let Some(prev) = chunks.last_mut() {
                    prev.push(' ');
                    prev.push_str(&last);
                }
            }
        }

        tracing::debug!(
            chunks = chunks.len(),
            max_tokens = self.max_tokens,
            overlap = self.overlap_sentences,
            "Created semantic chunks"
        );
        Ok(chunks)
    }

    /// Picks chunks whose estimated size fits `budget_tokens`, sampling evenly
    /// across the chapter when everything does not fit. Never returns an empty
    /// list for non-empty input.
    pub fn select_within_budget(&self, chunks: &[String], budget_tokens: usize) -> Vec<String> {
        let total: usize = chunks.iter().map(|c| estimate_tokens(c)).sum();
        if total <= budget_tokens || chunks.len() <= 2 {
            return chunks.to_vec();
        }

        let step = (chunks.len() / 10).max(1);
        let mut indices: Vec<usize> = (0..chunks.len()).step_by(step).collect();
        if indices.last() != Some(&(chunks.len() - 1)) {
            indices.push(chunks.len() - 1);
        }

        let mut selected = Vec::new();
        let mut running = 0usize;
        for idx in indices {
            let tokens = estimate_tokens(&chunks[idx]);
            if running + tokens > budget_tokens {
                break;
            }
            selected.push(chunks[idx].clone());
            running += tokens;
        }

        tracing::info!(
            selected = selected.len(),
            available = chunks.len(),
            tokens = running,
            total_tokens = total,
            "Applied chunk token budget"
        );

        if selected.is_empty() {
            vec![chunks[0].clone()]
        } else {
            selected
        }
    }
}

/// Sentence split after `.`, `!` or `?` followed by whitespace and an
/// uppercase letter or opening quote.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for caps in sentence_boundary().captures_iter(paragraph) {
        let (Some(end), Some(next)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let sentence = paragraph[start..end.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = next.start();
    }
    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
