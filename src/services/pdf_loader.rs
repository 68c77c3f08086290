use crate::config::{ChapterSource, PdfSettings};
use crate::error::DocumentError;
use async_trait::async_trait;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Supplies the plain text of one chapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn extract(&self, chapter: &ChapterSource) -> Result<String, DocumentError>;
}

/// Reads chapter PDFs from a single trusted directory.
#[derive(Debug, Clone)]
pub struct PdfTextSource {
    settings: PdfSettings,
}

impl PdfTextSource {
    pub fn new(settings: PdfSettings) -> Self {
        Self { settings }
    }

    /// Resolves `path` and checks that it is an acceptable PDF inside the
    /// allowed directory. Returns the canonical path.
    pub async fn validate_path(&self, path: &Path) -> Result<PathBuf, DocumentError> {
        let allowed = tokio::fs::canonicalize(&self.settings.allowed_directory)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => DocumentError::NotFound {
                    path: self.settings.allowed_directory.clone(),
                },
                _ => DocumentError::Io(e),
            })?;

        let resolved = tokio::fs::canonicalize(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => DocumentError::NotFound {
                path: path.to_path_buf(),
            },
            _ => DocumentError::Io(e),
        })?;

        if !resolved.starts_with(&allowed) {
            return Err(DocumentError::OutsideAllowedDirectory { path: resolved });
        }

        let metadata = tokio::fs::metadata(&resolved).await?;
        if !metadata.is_file() {
            return Err(DocumentError::NotAFile { path: resolved });
        }

        let is_pdf = resolved
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            return Err(DocumentError::NotPdf { path: resolved });
        }

        if metadata.len() > self.settings.max_size_bytes {
            return Err(DocumentError::TooLarge {
                size: metadata.len(),
                max: self.settings.max_size_bytes,
            });
        }

        tracing::debug!(path = %resolved.display(), bytes = metadata.len(), "PDF validated");
        Ok(resolved)
    }
}

#[async_trait]
impl TextSource for PdfTextSource {
    async fn extract(&self, chapter: &ChapterSource) -> Result<String, DocumentError> {
        let path = self.validate_path(&chapter.pdf_path).await?;

        let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
            .await
            .map_err(|e| DocumentError::Extraction(format!("extraction task failed: {}", e)))?
            .map_err(|e| DocumentError::Extraction(e.to_string()))?;

        let cleaned = clean_text(&raw);
        let chars = cleaned.chars().count();
        if chars < self.settings.min_text_chars {
            return Err(DocumentError::TooShort { chars });
        }

        tracing::info!(chapter_id = %chapter.id, chars, "Extracted chapter text");
        Ok(cleaned)
    }
}

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("bad regex: {e}")))
}

/// Normalizes extracted PDF text: collapses blank-line runs, drops lines
/// holding only a page number and squeezes horizontal whitespace.
pub fn clean_text(text: &str) -> String {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    static PAGE_NUMBERS: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let text = compiled(&BLANK_RUNS, r"\n{3,}").replace_all(text, "\n\n");
    let text = compiled(&PAGE_NUMBERS, r"(?m)^[ \t]*\d{1,4}[ \t]*$").replace_all(&text, "");
    let text = compiled(&SPACES, r"[ \t]+").replace_all(&text, " ");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source_for(dir: &TempDir, max_size_bytes: u64) -> PdfTextSource {
        PdfTextSource::new(PdfSettings {
            allowed_directory: dir.path().to_path_buf(),
            max_size_bytes,
            min_text_chars: 50,
        })
    }

    fn chapter(path: PathBuf) -> ChapterSource {
        ChapterSource {
            id: "1".to_string(),
            title: "Test".to_string(),
            pdf_path: path,
        }
    }

    #[test]
    fn clean_text_drops_page_numbers_and_extra_whitespace() {
        let raw = "Intro  text\there.\n\n\n\n12\nNext   line.\n  7  \nEnd.";
        assert_eq!(clean_text(raw), "Intro text here.\n\n\nNext line.\n\nEnd.");
    }

    #[tokio::test]
    async fn accepts_pdf_inside_allowed_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("chapter1.PDF");
        fs::write(&file, b"%PDF-1.4").unwrap();

        let resolved = source_for(&dir, 1024).validate_path(&file).await.unwrap();
        assert_eq!(resolved, fs::canonicalize(&file).unwrap());
    }

    #[tokio::test]
    async fn rejects_path_outside_allowed_directory() {
        let allowed = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let file = elsewhere.path().join("chapter1.pdf");
        fs::write(&file, b"%PDF-1.4").unwrap();

        let err = source_for(&allowed, 1024).validate_path(&file).await.unwrap_err();
        assert!(matches!(err, DocumentError::OutsideAllowedDirectory { .. }));

        let sneaky = allowed.path().join("..").join(
            elsewhere.path().file_name().unwrap(),
        ).join("chapter1.pdf");
        let err = source_for(&allowed, 1024).validate_path(&sneaky).await.unwrap_err();
        assert!(matches!(err, DocumentError::OutsideAllowedDirectory { .. }));
    }

    #[tokio::test]
    async fn rejects_missing_wrong_type_and_oversized_files() {
        let dir = TempDir::new().unwrap();
        let source = source_for(&dir, 16);

        let missing = source.validate_path(&dir.path().join("nope.pdf")).await.unwrap_err();
        assert!(matches!(missing, DocumentError::NotFound { .. }));

        let txt = dir.path().join("notes.txt");
        fs::write(&txt, b"hello").unwrap();
        let err = source.validate_path(&txt).await.unwrap_err();
        assert!(matches!(err, DocumentError::NotPdf { .. }));

        let folder = dir.path().join("folder.pdf");
        fs::create_dir(&folder).unwrap();
        let err = source.validate_path(&folder).await.unwrap_err();
        assert!(matches!(err, DocumentError::NotAFile { .. }));

        let big = dir.path().join("big.pdf");
        fs::write(&big, vec![b'x'; 64]).unwrap();
        let err = source.validate_path(&big).await.unwrap_err();
        assert!(matches!(err, DocumentError::TooLarge { size: 64, max: 16 }));
    }

    #[tokio::test]
    async fn garbage_pdf_is_an_extraction_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("broken.pdf");
        fs::write(&file, b"this is not really a pdf document").unwrap();

        let err = source_for(&dir, 1024).extract(&chapter(file)).await.unwrap_err();
        assert!(matches!(err, DocumentError::Extraction(_)));
        assert!(!err.public_reason().contains("broken.pdf"));
    }
}
