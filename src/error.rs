//! Crate error type.
//!
//! Every fallible operation returns [`Result`]. Per-document failures are
//! logged and counted by the batch runner; only [`DocsortError::ConverterUnavailable`]
//! and [`DocsortError::InvalidConfig`] stop a run.

use std::path::{Path, PathBuf};

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, DocsortError>;

#[derive(Debug, thiserror::Error)]
pub enum DocsortError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed for {path}: {message}")]
    PdfExtraction { path: PathBuf, message: String },

    #[error("PDF extraction panicked for {0} - likely contains malformed fonts")]
    PdfPanic(PathBuf),

    #[error("Failed to read spreadsheet {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("Unsupported mapping file format: {0}")]
    UnsupportedMappingFormat(String),

    #[error("Column '{column}' not found in {path} (available: {available})")]
    MissingColumn {
        path: PathBuf,
        column: String,
        available: String,
    },

    #[error("Invalid country variants file {path}: {source}")]
    Variants {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Converter '{program}' is not available on this host: {message}")]
    ConverterUnavailable { program: String, message: String },

    #[error("Conversion of {path} failed after {attempts} attempts: {message}")]
    Conversion {
        path: PathBuf,
        attempts: u32,
        message: String,
    },

    #[error("No free name left for {0}")]
    NamesExhausted(PathBuf),

    #[error("Checksum mismatch after copying {source_path} to {destination}")]
    ChecksumMismatch {
        source_path: PathBuf,
        destination: PathBuf,
    },

    #[error("Report error: {0}")]
    Report(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DocsortError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        DocsortError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = DocsortError::io(
            "/tmp/missing.pdf",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let message = err.to_string();
        assert!(message.contains("/tmp/missing.pdf"));
        assert!(message.contains("gone"));
    }
}
