//! Batch configuration.
//!
//! Everything a run needs is carried explicitly in [`BatchConfig`] and passed
//! down to each stage. The CLI builds it from flags and `DOCSORT_*` variables.

use crate::error::{DocsortError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Column reference in a mapping spreadsheet: header name or zero-based index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSelector {
    Name(String),
    Index(usize),
}

impl FromStr for ColumnSelector {
    type Err = DocsortError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DocsortError::InvalidConfig(
                "column selector cannot be empty".to_string(),
            ));
        }
        Ok(match trimmed.parse::<usize>() {
            Ok(index) => ColumnSelector::Index(index),
            Err(_) => ColumnSelector::Name(trimmed.to_string()),
        })
    }
}

impl std::fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnSelector::Name(name) => write!(f, "{}", name),
            ColumnSelector::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// Where the project -> country table comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSource {
    pub path: PathBuf,
    pub id_column: ColumnSelector,
    pub country_column: ColumnSelector,
}

/// Settings for the external office -> PDF conversion step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterConfig {
    /// Converter executable
    pub program: String,
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
    /// A single conversion is killed after this long
    pub timeout: Duration,
    /// Worker count override (auto-sized when None)
    pub workers: Option<usize>,
    /// Batch size override (auto-sized when None)
    pub batch_size: Option<usize>,
    /// Process image name force-killed between batches (None disables the reset)
    pub reset_process: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "soffice".to_string(),
            retries: 2,
            retry_delay: Duration::from_secs(3),
            timeout: Duration::from_secs(300),
            workers: None,
            batch_size: None,
            reset_process: Some("soffice.bin".to_string()),
        }
    }
}

/// Thresholds for text-based classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    /// Pages searched for an identifier
    pub identifier_pages: usize,
    /// Pages searched for a country name
    pub country_pages: usize,
    /// Pages read for language detection
    pub language_pages: usize,
    /// Stripped characters below which a paged document counts as scanned
    pub scan_floor: usize,
    /// Stripped characters above which language detection runs
    pub detection_threshold: usize,
    /// Stop gathering pages once this many characters are collected
    pub early_stop: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            identifier_pages: 10,
            country_pages: 10,
            language_pages: 3,
            scan_floor: 50,
            detection_threshold: 100,
            early_stop: 1000,
        }
    }
}

impl ClassifierConfig {
    /// Number of pages the extractor must return to satisfy every stage
    pub fn max_pages(&self) -> usize {
        self.identifier_pages
            .max(self.country_pages)
            .max(self.language_pages)
    }
}

/// Full configuration of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub mapping: Option<MappingSource>,
    pub variants: Option<PathBuf>,
    /// Sanitised document-type tag added to every filename during reorganization
    pub document_type: Option<String>,
    /// Look for project identifiers (disable to classify by language/country only)
    pub use_identifier: bool,
    /// Sort the output into bucket and country folders after classification
    pub reorganize: bool,
    /// Write inventory workbooks after reorganization
    pub reports: bool,
    pub converter: ConverterConfig,
    pub classifier: ClassifierConfig,
}

impl BatchConfig {
    pub fn new(input_root: PathBuf, output_root: PathBuf) -> Self {
        Self {
            input_root,
            output_root,
            mapping: None,
            variants: None,
            document_type: None,
            use_identifier: true,
            reorganize: true,
            reports: true,
            converter: ConverterConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }

    /// Check paths before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.input_root.is_dir() {
            return Err(DocsortError::InvalidConfig(format!(
                "input is not a directory: {}",
                self.input_root.display()
            )));
        }
        // Reorganization moves every PDF under the output, so the trees must
        // not overlap in either direction
        let input = canonical_path(&self.input_root);
        let output = canonical_path(&self.output_root);
        if output.starts_with(&input) || input.starts_with(&output) {
            return Err(DocsortError::InvalidConfig(format!(
                "input {} and output {} must not contain one another",
                self.input_root.display(),
                self.output_root.display()
            )));
        }
        if self.converter.workers == Some(0) || self.converter.batch_size == Some(0) {
            return Err(DocsortError::InvalidConfig(
                "workers and batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Canonical form of a path that may not exist yet: the deepest existing
/// ancestor is canonicalized and the missing components are re-attached.
fn canonical_path(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(resolved) = current.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Normalise a user-supplied document type: lower-case ASCII letters only.
///
/// Returns None when nothing usable is left.
pub fn sanitize_document_type(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
