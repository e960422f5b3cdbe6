//! Page Text Extraction
//!
//! Classification only ever looks at the first few pages of a document, so
//! extraction hands back per-page text plus the real page count.
//!
//! ## Strategy
//! 1. Read the whole PDF and split its text by page (pure Rust, pdf-extract)
//! 2. Keep only the pages any classifier stage will look at
//! 3. Failures are reported to the caller, which treats them as "no text"

mod pdf;

pub use pdf::PdfPageExtractor;

use crate::error::Result;
use std::path::Path;

/// Text of the leading pages of a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    /// Text per page, at most the requested number of pages
    pub pages: Vec<String>,
    /// Total number of pages in the document
    pub page_count: usize,
}

impl PageText {
    pub fn new(pages: Vec<String>, page_count: usize) -> Self {
        Self { pages, page_count }
    }

    /// Build from a full page list, keeping the first `max_pages`
    pub fn from_all_pages(mut pages: Vec<String>, max_pages: usize) -> Self {
        let page_count = pages.len();
        pages.truncate(max_pages);
        Self { pages, page_count }
    }

    /// Iterate over the first `limit` pages
    pub fn leading(&self, limit: usize) -> impl Iterator<Item = &str> {
        self.pages.iter().take(limit).map(String::as_str)
    }
}

/// Source of page text for a document on disk
pub trait PageExtractor: Send + Sync {
    fn extract(&self, path: &Path, max_pages: usize) -> Result<PageText>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_all_pages_keeps_real_count() {
        let pages: Vec<String> = (0..15).map(|i| format!("page {}", i)).collect();
        let text = PageText::from_all_pages(pages, 10);
        assert_eq!(text.pages.len(), 10);
        assert_eq!(text.page_count, 15);
        assert_eq!(text.leading(3).count(), 3);
    }}
