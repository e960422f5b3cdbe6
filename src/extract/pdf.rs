//! PDF page extraction via pdf-extract.

use super::{PageExtractor, PageText};
use crate::error::{DocsortError, Result};
use std::path::Path;

/// Maximum text kept per page (to avoid memory issues with huge pages)
const MAX_PAGE_TEXT_LENGTH: usize = 100_000;

/// Page extractor backed by the `pdf-extract` crate
#[derive(Debug, Clone, Default)]
pub struct PdfPageExtractor;

impl PdfPageExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Clamp a page's text to a sane size on a char boundary
    fn clamp_page(mut text: String) -> String {
        if text.len() > MAX_PAGE_TEXT_LENGTH {
            let mut cut = MAX_PAGE_TEXT_LENGTH;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        text
    }
}

impl PageExtractor for PdfPageExtractor {
    /// Wrapped in catch_unwind to handle panics from malformed PDFs
    fn extract(&self, path: &Path, max_pages: usize) -> Result<PageText> {
        let bytes = std::fs::read(path).map_err(|e| DocsortError::io(path, e))?;

        tracing::debug!("[PdfPageExtractor] {} bytes from {}", bytes.len(), path.display());

        // The pdf_extract crate (and its cff-parser dependency) can panic on certain fonts/glyphs
        let pages = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })) {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                tracing::warn!("[PdfPageExtractor] extraction failed for {}: {}", path.display(), e);
                return Err(DocsortError::PdfExtraction {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
            }
            Err(_panic) => {
                tracing::error!(
                    "[PdfPageExtractor] extraction panicked for {} - likely malformed font/glyph",
                    path.display()
                );
                return Err(DocsortError::PdfPanic(path.to_path_buf()));
            }
        };

        let pages: Vec<String> = pages.into_iter().map(Self::clamp_page).collect();
        let text = PageText::from_all_pages(pages, max_pages);

        tracing::debug!(
            "[PdfPageExtractor] {} pages, {} kept, {} chars from {}",
            text.page_count,
            text.pages.len(),
            text.pages.iter().map(|p| p.len()).sum::<usize>(),
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_is_io_error() {
        let extractor = PdfPageExtractor::new();
        let result = extractor.extract(Path::new("/nonexistent/never.pdf"), 10);
        assert!(matches!(result, Err(DocsortError::Io { .. })));
    }

    #[test]
    fn test_garbage_bytes_fail_without_panicking() {
        let file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(file.path(), b"definitely not a pdf").unwrap();

        let result = PdfPageExtractor::new().extract(file.path(), 10);
        assert!(result.is_err());
    }

    #[test]
    fn test_clamp_page_respects_char_boundaries() {
        let text = "é".repeat(MAX_PAGE_TEXT_LENGTH);
        let clamped = PdfPageExtractor::clamp_page(text);
        assert!(clamped.len() <= MAX_PAGE_TEXT_LENGTH);
        assert!(clamped.chars().all(|c| c == 'é'));
    }
}
